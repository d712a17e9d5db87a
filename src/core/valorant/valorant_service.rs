// Valorant account linking and MMR tracking.
//
// The service talks to the Henrik API through `HenrikApi` and persists players
// and recorded custom matches through `PlayerStore`.

use super::henrik_models::{AccountData, MatchData, MmrData};
use super::rating::{
    adr, hidden_rating, match_start, summarize, tier_to_score, visible_mmr, HiddenRating,
    MatchLine,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// DOMAIN TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub discord_id: u64,
    pub puuid: String,
    pub riot_name: String,
    pub riot_tag: String,
    pub discord_nick: Option<String>,
    pub competitive_mmr: i32,
    pub hidden: HiddenRating,
    pub visible_mmr: i32,
    pub seeded: bool,
    pub last_active: DateTime<Utc>,
}

impl Player {
    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.riot_name, self.riot_tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrUpdate {
    pub competitive_mmr: i32,
    pub hidden: HiddenRating,
    pub visible_mmr: i32,
}

/// One player's row of a recorded custom match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPlayerRow {
    pub match_id: String,
    pub puuid: String,
    pub riot_name: String,
    pub riot_tag: String,
    pub map: String,
    pub agent: String,
    pub kda: String,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
    pub score: i32,
    pub adr: i64,
    pub hs_pct: f64,
    pub team: String,
    pub won: bool,
    pub round_count: i32,
    pub team1_score: i32,
    pub team2_score: i32,
    pub tier: Option<String>,
    pub game_start: DateTime<Utc>,
}

pub struct RankReport {
    pub player: Player,
    pub tier: String,
    pub rr: i32,
    pub image: Option<String>,
    pub recent: Vec<MatchLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshProgress {
    pub done: usize,
    pub total: usize,
    pub riot_id: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RefreshSummary {
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiotIdChange {
    pub puuid: String,
    pub old_riot_id: String,
    pub new_riot_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SeedReport {
    pub seeded: usize,
    pub skipped: usize,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ValorantError {
    #[error("A Riot ID looks like Name#TAG")]
    InvalidRiotId,

    #[error("Riot account `{0}` was not found")]
    AccountNotFound(String),

    #[error("No Riot account is linked, use /link first")]
    NotLinked,

    #[error("Could not load rank information for {0}")]
    RankUnavailable(String),

    #[error("Henrik API error: {0}")]
    Api(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// PORTS
// ============================================================================

#[async_trait]
pub trait HenrikApi: Send + Sync {
    async fn account_by_riot_id(
        &self,
        name: &str,
        tag: &str,
    ) -> Result<Option<AccountData>, ValorantError>;

    async fn account_by_puuid(&self, puuid: &str) -> Result<Option<AccountData>, ValorantError>;

    async fn competitive_mmr(
        &self,
        region: &str,
        name: &str,
        tag: &str,
    ) -> Result<Option<MmrData>, ValorantError>;

    /// Most recent first.
    async fn recent_matches(
        &self,
        region: &str,
        puuid: &str,
        custom_only: bool,
    ) -> Result<Vec<MatchData>, ValorantError>;
}

#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Insert or relink a player, marking them seeded and active.
    async fn upsert_link(
        &self,
        discord_id: u64,
        puuid: &str,
        riot_name: &str,
        riot_tag: &str,
    ) -> Result<(), ValorantError>;

    async fn player(&self, discord_id: u64) -> Result<Option<Player>, ValorantError>;

    async fn all_players(&self) -> Result<Vec<Player>, ValorantError>;

    async fn linked_puuids(&self) -> Result<HashSet<String>, ValorantError>;

    async fn update_mmr(&self, puuid: &str, update: &MmrUpdate) -> Result<(), ValorantError>;

    async fn rename(&self, puuid: &str, riot_name: &str, riot_tag: &str)
        -> Result<(), ValorantError>;

    /// Returns false when the member has no linked account.
    async fn update_nick(&self, discord_id: u64, nick: &str) -> Result<bool, ValorantError>;

    /// Ordered by visible MMR, highest first.
    async fn top_by_visible(&self, limit: usize) -> Result<Vec<Player>, ValorantError>;

    async fn is_analyzed(&self, match_id: &str) -> Result<bool, ValorantError>;

    /// Store a custom match's rows (existing rows are kept), bump every
    /// participant's last_active to the match start and mark it analysed.
    async fn record_match(
        &self,
        match_id: &str,
        rows: &[MatchPlayerRow],
    ) -> Result<(), ValorantError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub const RECENT_MATCH_COUNT: usize = 5;
pub const LOBBY_SIZE: usize = 10;
pub const DEFAULT_TIER: &str = "Iron 1";

/// Split `Name#TAG` on the first '#'.
pub fn parse_riot_id(text: &str) -> Result<(String, String), ValorantError> {
    let (name, tag) = text.trim().split_once('#').ok_or(ValorantError::InvalidRiotId)?;
    let (name, tag) = (name.trim(), tag.trim());
    if name.is_empty() || tag.is_empty() {
        return Err(ValorantError::InvalidRiotId);
    }
    Ok((name.to_string(), tag.to_string()))
}

pub struct ValorantService<A: HenrikApi, S: PlayerStore> {
    api: A,
    store: S,
    region: String,
}

impl<A: HenrikApi, S: PlayerStore> ValorantService<A, S> {
    pub fn new(api: A, store: S, region: impl Into<String>) -> Self {
        Self {
            api,
            store,
            region: region.into(),
        }
    }

    async fn linked(&self, discord_id: u64) -> Result<Player, ValorantError> {
        self.store
            .player(discord_id)
            .await?
            .ok_or(ValorantError::NotLinked)
    }

    /// Link a Discord member to a Riot account.
    pub async fn link(&self, discord_id: u64, riot_id: &str) -> Result<AccountData, ValorantError> {
        let (name, tag) = parse_riot_id(riot_id)?;
        let account = self
            .api
            .account_by_riot_id(&name, &tag)
            .await?
            .ok_or_else(|| ValorantError::AccountNotFound(format!("{name}#{tag}")))?;

        self.store
            .upsert_link(discord_id, &account.puuid, &name, &tag)
            .await?;

        tracing::info!(discord_id, puuid = %account.puuid, "Linked {}#{}", name, tag);
        Ok(account)
    }

    /// Current competitive tier plus the latest competitive matches.
    pub async fn rank(&self, discord_id: u64) -> Result<RankReport, ValorantError> {
        let player = self.linked(discord_id).await?;
        let mmr = self
            .api
            .competitive_mmr(&self.region, &player.riot_name, &player.riot_tag)
            .await?
            .ok_or_else(|| ValorantError::RankUnavailable(player.riot_id()))?;

        let recent = self.match_lines(&player, false).await?;

        Ok(RankReport {
            tier: mmr
                .currenttierpatched
                .unwrap_or_else(|| "Unrated".to_string()),
            rr: mmr.ranking_in_tier,
            image: mmr.images.small,
            player,
            recent,
        })
    }

    /// The latest matches of a linked member, competitive or custom.
    pub async fn recent_matches(
        &self,
        discord_id: u64,
        custom_only: bool,
    ) -> Result<(Player, Vec<MatchLine>), ValorantError> {
        let player = self.linked(discord_id).await?;
        let lines = self.match_lines(&player, custom_only).await?;
        Ok((player, lines))
    }

    async fn match_lines(
        &self,
        player: &Player,
        custom_only: bool,
    ) -> Result<Vec<MatchLine>, ValorantError> {
        let matches = self
            .api
            .recent_matches(&self.region, &player.puuid, custom_only)
            .await?;
        Ok(matches
            .iter()
            .take(RECENT_MATCH_COUNT)
            .filter_map(|m| summarize(m, &player.puuid))
            .collect())
    }

    pub async fn mmr_details(&self, discord_id: u64) -> Result<Player, ValorantError> {
        self.linked(discord_id).await
    }

    /// Recompute one player's ratings from the API and store them.
    pub async fn refresh_player(&self, player: &Player) -> Result<MmrUpdate, ValorantError> {
        let mmr = self
            .api
            .competitive_mmr(&self.region, &player.riot_name, &player.riot_tag)
            .await?
            .unwrap_or_default();
        let tier = mmr.currenttierpatched.as_deref().unwrap_or(DEFAULT_TIER);
        let competitive_mmr = tier_to_score(tier, mmr.ranking_in_tier);

        let matches = self
            .api
            .recent_matches(&self.region, &player.puuid, false)
            .await?;
        let hidden = hidden_rating(&matches, &player.puuid);

        let update = MmrUpdate {
            competitive_mmr,
            hidden,
            visible_mmr: visible_mmr(competitive_mmr, hidden.win_mmr),
        };
        self.store.update_mmr(&player.puuid, &update).await?;

        tracing::info!(
            puuid = %player.puuid,
            competitive = update.competitive_mmr,
            hidden = update.hidden.win_mmr,
            visible = update.visible_mmr,
            "MMR refreshed for {}",
            player.riot_id()
        );
        Ok(update)
    }

    /// Refresh every player, pausing `throttle` between players. A failure
    /// for one player is reported and skipped.
    pub async fn refresh_all(
        &self,
        throttle: Duration,
        mut on_progress: impl FnMut(RefreshProgress) + Send,
    ) -> Result<RefreshSummary, ValorantError> {
        let players = self.store.all_players().await?;
        let total = players.len();
        let mut summary = RefreshSummary::default();

        for (i, player) in players.iter().enumerate() {
            if i > 0 && !throttle.is_zero() {
                tokio::time::sleep(throttle).await;
            }

            let succeeded = match self.refresh_player(player).await {
                Ok(_) => {
                    summary.updated += 1;
                    true
                }
                Err(e) => {
                    tracing::warn!("MMR refresh failed for {}: {}", player.riot_id(), e);
                    summary.failed += 1;
                    false
                }
            };

            on_progress(RefreshProgress {
                done: i + 1,
                total,
                riot_id: player.riot_id(),
                succeeded,
            });
        }

        Ok(summary)
    }

    /// Rename players whose Riot ID changed since they linked.
    pub async fn detect_riot_id_changes(&self) -> Result<Vec<RiotIdChange>, ValorantError> {
        let mut changes = Vec::new();

        for player in self.store.all_players().await? {
            let account = match self.api.account_by_puuid(&player.puuid).await {
                Ok(Some(account)) => account,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("PUUID lookup failed for {}: {}", player.riot_id(), e);
                    continue;
                }
            };

            if account.name.is_empty() {
                continue;
            }
            if account.name != player.riot_name || account.tag != player.riot_tag {
                self.store
                    .rename(&player.puuid, &account.name, &account.tag)
                    .await?;
                let change = RiotIdChange {
                    puuid: player.puuid.clone(),
                    old_riot_id: player.riot_id(),
                    new_riot_id: format!("{}#{}", account.name, account.tag),
                };
                tracing::info!("Riot ID changed: {} -> {}", change.old_riot_id, change.new_riot_id);
                changes.push(change);
            }
        }

        Ok(changes)
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<Player>, ValorantError> {
        self.store.top_by_visible(limit).await
    }

    pub async fn update_nick(&self, discord_id: u64, nick: &str) -> Result<bool, ValorantError> {
        self.store.update_nick(discord_id, nick).await
    }

    /// Seed players from spreadsheet rows. The first row is the header and
    /// must name `USER ID`, `RIOT NAME` and `RIOT TAG`; `PUUID` is optional
    /// and looked up when blank.
    pub async fn seed_from_sheet(&self, rows: &[Vec<String>]) -> Result<SeedReport, ValorantError> {
        let mut report = SeedReport::default();
        let Some((header, body)) = rows.split_first() else {
            return Ok(report);
        };

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let (Some(id_col), Some(name_col), Some(tag_col)) =
            (column("USER ID"), column("RIOT NAME"), column("RIOT TAG"))
        else {
            tracing::warn!("Player sheet is missing required columns");
            return Ok(report);
        };
        let puuid_col = column("PUUID");

        for row in body {
            let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
            let user_id = cell(id_col);
            if user_id.is_empty() {
                continue;
            }

            let Ok(discord_id) = user_id.parse::<u64>() else {
                tracing::warn!("Sheet row skipped, USER ID is not numeric: {}", user_id);
                report.skipped += 1;
                continue;
            };
            let (name, tag) = (cell(name_col), cell(tag_col));
            if name.is_empty() || tag.is_empty() {
                report.skipped += 1;
                continue;
            }

            let mut puuid = puuid_col.map(cell).unwrap_or("").to_string();
            if puuid.is_empty() {
                match self.api.account_by_riot_id(name, tag).await {
                    Ok(Some(account)) => puuid = account.puuid,
                    Ok(None) | Err(_) => {
                        tracing::warn!("Sheet row skipped, no PUUID for {}#{}", name, tag);
                        report.skipped += 1;
                        continue;
                    }
                }
            }

            self.store.upsert_link(discord_id, &puuid, name, tag).await?;
            report.seeded += 1;
        }

        tracing::info!(seeded = report.seeded, skipped = report.skipped, "Sheet seeding done");
        Ok(report)
    }

    /// Store up to `limit` recent custom matches of `discord_id` in which all
    /// ten players are linked and which were not recorded before.
    pub async fn record_lobby_matches(
        &self,
        discord_id: u64,
        limit: usize,
    ) -> Result<usize, ValorantError> {
        let player = self.linked(discord_id).await?;
        let matches = self
            .api
            .recent_matches(&self.region, &player.puuid, true)
            .await?;
        let linked = self.store.linked_puuids().await?;

        let mut recorded = 0;
        for m in &matches {
            if recorded >= limit {
                break;
            }
            let players = &m.players.all_players;
            if players.len() != LOBBY_SIZE || !players.iter().all(|p| linked.contains(&p.puuid)) {
                continue;
            }
            if m.metadata.matchid.is_empty() || self.store.is_analyzed(&m.metadata.matchid).await? {
                continue;
            }

            let rows = match_rows(m);
            self.store.record_match(&m.metadata.matchid, &rows).await?;
            recorded += 1;
        }

        tracing::info!(discord_id, recorded, "Custom matches recorded");
        Ok(recorded)
    }
}

fn match_rows(m: &MatchData) -> Vec<MatchPlayerRow> {
    let started = match_start(m);
    let map = m.metadata.map.clone().unwrap_or_else(|| "?".to_string());
    let team1_score = m.rounds_won("red");
    let team2_score = m.rounds_won("blue");

    m.players
        .all_players
        .iter()
        .map(|p| MatchPlayerRow {
            match_id: m.metadata.matchid.clone(),
            puuid: p.puuid.clone(),
            riot_name: p.name.clone(),
            riot_tag: p.tag.clone(),
            map: map.clone(),
            agent: p.character.clone().unwrap_or_else(|| "?".to_string()),
            kda: format!("{}/{}/{}", p.stats.kills, p.stats.deaths, p.stats.assists),
            kills: p.stats.kills,
            deaths: p.stats.deaths,
            assists: p.stats.assists,
            score: p.stats.score,
            adr: adr(p.damage_made, m.metadata.rounds_played),
            hs_pct: p.stats.headshot_pct(),
            team: p.team.clone(),
            won: m.team_won(&p.team),
            round_count: m.metadata.rounds_played,
            team1_score,
            team2_score,
            tier: p.currenttier_patched.clone(),
            game_start: started,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::valorant::henrik_models::{MatchPlayer, MmrImages, PlayerStats, TeamResult};
    use crate::infra::valorant::InMemoryPlayerStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeHenrik {
        accounts: HashMap<String, AccountData>,
        by_puuid: HashMap<String, AccountData>,
        tiers: HashMap<String, (String, i32)>,
        matches: Vec<MatchData>,
        customs: Vec<MatchData>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HenrikApi for FakeHenrik {
        async fn account_by_riot_id(
            &self,
            name: &str,
            tag: &str,
        ) -> Result<Option<AccountData>, ValorantError> {
            Ok(self.accounts.get(&format!("{name}#{tag}")).cloned())
        }

        async fn account_by_puuid(
            &self,
            puuid: &str,
        ) -> Result<Option<AccountData>, ValorantError> {
            Ok(self.by_puuid.get(puuid).cloned())
        }

        async fn competitive_mmr(
            &self,
            region: &str,
            name: &str,
            tag: &str,
        ) -> Result<Option<MmrData>, ValorantError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("mmr {region} {name}#{tag}"));
            if name == "broken" {
                return Err(ValorantError::Api("status 500".into()));
            }
            Ok(self
                .tiers
                .get(&format!("{name}#{tag}"))
                .map(|(tier, rr)| MmrData {
                    currenttierpatched: Some(tier.clone()),
                    ranking_in_tier: *rr,
                    images: MmrImages::default(),
                }))
        }

        async fn recent_matches(
            &self,
            _region: &str,
            _puuid: &str,
            custom_only: bool,
        ) -> Result<Vec<MatchData>, ValorantError> {
            Ok(if custom_only {
                self.customs.clone()
            } else {
                self.matches.clone()
            })
        }
    }

    fn account(puuid: &str, name: &str, tag: &str) -> AccountData {
        AccountData {
            puuid: puuid.into(),
            name: name.into(),
            tag: tag.into(),
        }
    }

    fn lobby_match(id: &str, puuids: &[String]) -> MatchData {
        let mut m = MatchData::default();
        m.metadata.matchid = id.to_string();
        m.metadata.rounds_played = 24;
        m.metadata.game_start = 1_700_000_000;
        for (i, puuid) in puuids.iter().enumerate() {
            m.players.all_players.push(MatchPlayer {
                puuid: puuid.clone(),
                name: format!("p{i}"),
                tag: "NA1".into(),
                team: if i % 2 == 0 { "Red" } else { "Blue" }.into(),
                stats: PlayerStats {
                    kills: 10,
                    deaths: 10,
                    assists: 5,
                    ..Default::default()
                },
                damage_made: 2400,
                ..Default::default()
            });
        }
        m.teams.insert(
            "red".into(),
            TeamResult {
                has_won: true,
                rounds_won: 13,
            },
        );
        m.teams.insert(
            "blue".into(),
            TeamResult {
                has_won: false,
                rounds_won: 11,
            },
        );
        m
    }

    #[test]
    fn riot_id_parsing() {
        assert_eq!(
            parse_riot_id("Sova Main#NA1").unwrap(),
            ("Sova Main".to_string(), "NA1".to_string())
        );
        assert_eq!(
            parse_riot_id("a#b#c").unwrap(),
            ("a".to_string(), "b#c".to_string())
        );
        assert!(matches!(parse_riot_id("nohash"), Err(ValorantError::InvalidRiotId)));
        assert!(matches!(parse_riot_id("#tag"), Err(ValorantError::InvalidRiotId)));
    }

    #[tokio::test]
    async fn link_stores_the_account() {
        let mut api = FakeHenrik::default();
        api.accounts
            .insert("Jett#EUW".into(), account("puuid-1", "Jett", "EUW"));
        let service = ValorantService::new(api, InMemoryPlayerStore::new(), "na");

        service.link(42, "Jett#EUW").await.unwrap();
        let player = service.mmr_details(42).await.unwrap();
        assert_eq!(player.puuid, "puuid-1");
        assert!(player.seeded);
        assert_eq!(player.visible_mmr, 1000);

        let err = service.link(42, "Nobody#000").await.unwrap_err();
        assert!(matches!(err, ValorantError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn unlinked_members_get_not_linked() {
        let service = ValorantService::new(FakeHenrik::default(), InMemoryPlayerStore::new(), "na");
        assert!(matches!(service.rank(1).await, Err(ValorantError::NotLinked)));
    }

    #[tokio::test]
    async fn refresh_player_blends_tier_and_hidden() {
        let mut api = FakeHenrik::default();
        api.tiers.insert("Jett#EUW".into(), ("Gold 2".into(), 40));
        let store = InMemoryPlayerStore::new();
        store.upsert_link(1, "p0", "Jett", "EUW").await.unwrap();
        let service = ValorantService::new(api, store, "eu");

        let player = service.mmr_details(1).await.unwrap();
        let update = service.refresh_player(&player).await.unwrap();

        assert_eq!(update.competitive_mmr, 3040);
        assert_eq!(update.hidden, HiddenRating::default());
        assert_eq!(update.visible_mmr, 1816);
        assert_eq!(service.leaderboard(10).await.unwrap()[0].visible_mmr, 1816);
        assert_eq!(
            service.api.calls.lock().unwrap().as_slice(),
            &["mmr eu Jett#EUW".to_string()]
        );
    }

    #[tokio::test]
    async fn refresh_all_reports_progress_and_skips_failures() {
        let store = InMemoryPlayerStore::new();
        store.upsert_link(1, "p1", "fine", "NA1").await.unwrap();
        store.upsert_link(2, "p2", "broken", "NA1").await.unwrap();
        let service = ValorantService::new(FakeHenrik::default(), store, "na");

        let mut seen = Vec::new();
        let summary = service
            .refresh_all(Duration::ZERO, |p| seen.push((p.done, p.total, p.succeeded)))
            .await
            .unwrap();

        assert_eq!(summary, RefreshSummary { updated: 1, failed: 1 });
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0, 2);
        assert!(seen.iter().all(|(_, total, _)| *total == 2));
    }

    #[tokio::test]
    async fn riot_id_changes_are_applied() {
        let mut api = FakeHenrik::default();
        api.by_puuid
            .insert("p1".into(), account("p1", "NewName", "123"));
        api.by_puuid.insert("p2".into(), account("p2", "Same", "NA1"));
        let store = InMemoryPlayerStore::new();
        store.upsert_link(1, "p1", "OldName", "123").await.unwrap();
        store.upsert_link(2, "p2", "Same", "NA1").await.unwrap();
        let service = ValorantService::new(api, store, "na");

        let changes = service.detect_riot_id_changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_riot_id, "OldName#123");
        assert_eq!(changes[0].new_riot_id, "NewName#123");
        assert_eq!(
            service.mmr_details(1).await.unwrap().riot_id(),
            "NewName#123"
        );
    }

    #[tokio::test]
    async fn seed_from_sheet_counts_seeded_and_skipped() {
        let mut api = FakeHenrik::default();
        api.accounts
            .insert("Lookup#NA1".into(), account("looked-up", "Lookup", "NA1"));
        let service = ValorantService::new(api, InMemoryPlayerStore::new(), "na");

        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        let rows = vec![
            row(&["USER ID", "RIOT NAME", "RIOT TAG", "PUUID"]),
            row(&["100", "Given", "NA1", "given-puuid"]),
            row(&["101", "Lookup", "NA1", ""]),
            row(&["abc", "Bad", "NA1", ""]),
            row(&["102", "", "NA1", ""]),
            row(&["103", "Ghost", "NA1"]),
            row(&["", "", "", ""]),
        ];

        let report = service.seed_from_sheet(&rows).await.unwrap();
        assert_eq!(report, SeedReport { seeded: 2, skipped: 3 });
        assert_eq!(service.mmr_details(101).await.unwrap().puuid, "looked-up");
    }

    #[tokio::test]
    async fn lobby_matches_need_ten_linked_players() {
        let puuids: Vec<String> = (0..10).map(|i| format!("p{i}")).collect();
        let mut outsiders = puuids.clone();
        outsiders[9] = "stranger".into();

        let mut api = FakeHenrik::default();
        api.customs = vec![
            lobby_match("full-1", &puuids),
            lobby_match("outsider", &outsiders),
            lobby_match("short", &puuids[..8]),
            lobby_match("full-2", &puuids),
            lobby_match("full-3", &puuids),
            lobby_match("full-4", &puuids),
        ];
        let store = InMemoryPlayerStore::new();
        for (i, puuid) in puuids.iter().enumerate() {
            store
                .upsert_link(i as u64, puuid, &format!("p{i}"), "NA1")
                .await
                .unwrap();
        }
        let service = ValorantService::new(api, store, "na");

        assert_eq!(service.record_lobby_matches(0, 3).await.unwrap(), 3);
        assert!(service.store.is_analyzed("full-3").await.unwrap());
        assert!(!service.store.is_analyzed("full-4").await.unwrap());
        assert!(!service.store.is_analyzed("outsider").await.unwrap());

        // Already analysed matches are skipped on the next run.
        assert_eq!(service.record_lobby_matches(0, 3).await.unwrap(), 1);

        let rows = service.store.match_rows("full-1");
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].adr, 100);
        assert_eq!((rows[0].team1_score, rows[0].team2_score), (13, 11));
        assert!(rows[0].won);
        assert!(!rows[1].won);
    }
}
