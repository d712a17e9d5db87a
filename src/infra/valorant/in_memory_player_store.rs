// In-memory PlayerStore used by the service tests.

use crate::core::valorant::{
    HiddenRating, MatchPlayerRow, MmrUpdate, Player, PlayerStore, ValorantError,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    players: BTreeMap<u64, Player>,
    match_rows: HashMap<String, Vec<MatchPlayerRow>>,
    analyzed: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryPlayerStore {
    state: Mutex<State>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, ValorantError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| ValorantError::StorageError(e.to_string()))?;
        Ok(f(&mut state))
    }

    pub fn match_rows(&self, match_id: &str) -> Vec<MatchPlayerRow> {
        self.with_state(|s| s.match_rows.get(match_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn upsert_link(
        &self,
        discord_id: u64,
        puuid: &str,
        riot_name: &str,
        riot_tag: &str,
    ) -> Result<(), ValorantError> {
        self.with_state(|s| {
            let now = Utc::now();
            let player = s.players.entry(discord_id).or_insert_with(|| Player {
                discord_id,
                puuid: String::new(),
                riot_name: String::new(),
                riot_tag: String::new(),
                discord_nick: None,
                competitive_mmr: 1000,
                hidden: HiddenRating::default(),
                visible_mmr: 1000,
                seeded: true,
                last_active: now,
            });
            player.puuid = puuid.to_string();
            player.riot_name = riot_name.to_string();
            player.riot_tag = riot_tag.to_string();
            player.seeded = true;
            player.last_active = now;
        })
    }

    async fn player(&self, discord_id: u64) -> Result<Option<Player>, ValorantError> {
        self.with_state(|s| s.players.get(&discord_id).cloned())
    }

    async fn all_players(&self) -> Result<Vec<Player>, ValorantError> {
        self.with_state(|s| s.players.values().cloned().collect())
    }

    async fn linked_puuids(&self) -> Result<HashSet<String>, ValorantError> {
        self.with_state(|s| s.players.values().map(|p| p.puuid.clone()).collect())
    }

    async fn update_mmr(&self, puuid: &str, update: &MmrUpdate) -> Result<(), ValorantError> {
        self.with_state(|s| {
            for player in s.players.values_mut().filter(|p| p.puuid == puuid) {
                player.competitive_mmr = update.competitive_mmr;
                player.hidden = update.hidden;
                player.visible_mmr = update.visible_mmr;
                player.last_active = Utc::now();
            }
        })
    }

    async fn rename(
        &self,
        puuid: &str,
        riot_name: &str,
        riot_tag: &str,
    ) -> Result<(), ValorantError> {
        self.with_state(|s| {
            for player in s.players.values_mut().filter(|p| p.puuid == puuid) {
                player.riot_name = riot_name.to_string();
                player.riot_tag = riot_tag.to_string();
            }
        })
    }

    async fn update_nick(&self, discord_id: u64, nick: &str) -> Result<bool, ValorantError> {
        self.with_state(|s| match s.players.get_mut(&discord_id) {
            Some(player) => {
                player.discord_nick = Some(nick.to_string());
                true
            }
            None => false,
        })
    }

    async fn top_by_visible(&self, limit: usize) -> Result<Vec<Player>, ValorantError> {
        self.with_state(|s| {
            let mut players: Vec<Player> = s.players.values().cloned().collect();
            players.sort_by(|a, b| b.visible_mmr.cmp(&a.visible_mmr));
            players.truncate(limit);
            players
        })
    }

    async fn is_analyzed(&self, match_id: &str) -> Result<bool, ValorantError> {
        self.with_state(|s| s.analyzed.contains(match_id))
    }

    async fn record_match(
        &self,
        match_id: &str,
        rows: &[MatchPlayerRow],
    ) -> Result<(), ValorantError> {
        self.with_state(|s| {
            let stored = s.match_rows.entry(match_id.to_string()).or_default();
            for row in rows {
                if !stored.iter().any(|r| r.puuid == row.puuid) {
                    stored.push(row.clone());
                }
                for player in s.players.values_mut().filter(|p| p.puuid == row.puuid) {
                    player.last_active = row.game_start;
                }
            }
            s.analyzed.insert(match_id.to_string());
        })
    }
}
