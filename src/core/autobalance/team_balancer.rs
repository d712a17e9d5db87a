// Splits a player list into two teams with the smallest MMR gap.
//
// Lobbies are at most ten players, so every split is tried: C(10, 5) = 252.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

pub const MAX_PLAYERS: usize = 10;

/// MMR used for placeholder seats added to a custom game lobby.
pub const PLACEHOLDER_MMR: i32 = 1;

/// Splits older than this can no longer be moved into voice.
pub const SPLIT_RETENTION_HOURS: i64 = 6;

#[derive(Debug, Error, PartialEq)]
pub enum BalanceError {
    #[error("At least 2 players are needed, got {0}")]
    TooFewPlayers(usize),

    #[error("At most {MAX_PLAYERS} players can be balanced, got {0}")]
    TooManyPlayers(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancePlayer {
    /// Riot ID or placeholder name shown in the result.
    pub label: String,
    /// Discord member to move, None for placeholders.
    pub member_id: Option<u64>,
    pub mmr: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSplit {
    pub team_a: Vec<BalancePlayer>,
    pub team_b: Vec<BalancePlayer>,
    /// Absolute MMR difference between the teams.
    pub gap: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    A,
    B,
}

impl TeamSplit {
    pub fn team(&self, team: Team) -> &[BalancePlayer] {
        match team {
            Team::A => &self.team_a,
            Team::B => &self.team_b,
        }
    }

    pub fn members(&self, team: Team) -> Vec<u64> {
        self.team(team).iter().filter_map(|p| p.member_id).collect()
    }

    pub fn total(&self, team: Team) -> i64 {
        self.team(team).iter().map(|p| i64::from(p.mmr)).sum()
    }
}

/// Try every way to put `n / 2` players in team A and keep the closest one.
/// The first player always lands in team A so mirrored splits are skipped.
/// Ties keep the first split found, which follows input order.
pub fn balance_teams(players: &[BalancePlayer]) -> Result<TeamSplit, BalanceError> {
    let n = players.len();
    if n < 2 {
        return Err(BalanceError::TooFewPlayers(n));
    }
    if n > MAX_PLAYERS {
        return Err(BalanceError::TooManyPlayers(n));
    }

    let size_a = n / 2;
    let total: i64 = players.iter().map(|p| i64::from(p.mmr)).sum();

    let mut best: Option<(i64, u32)> = None;
    for mask in 0u32..(1 << n) {
        if mask & 1 == 0 || mask.count_ones() as usize != size_a {
            continue;
        }
        let sum_a: i64 = (0..n)
            .filter(|i| mask & (1 << i) != 0)
            .map(|i| i64::from(players[i].mmr))
            .sum();
        let gap = (total - 2 * sum_a).abs();
        if best.map_or(true, |(best_gap, _)| gap < best_gap) {
            best = Some((gap, mask));
        }
    }

    let (gap, mask) = best.ok_or(BalanceError::TooFewPlayers(n))?;
    let (team_a, team_b): (Vec<_>, Vec<_>) = players
        .iter()
        .enumerate()
        .partition(|(i, _)| mask & (1 << i) != 0);

    Ok(TeamSplit {
        team_a: team_a.into_iter().map(|(_, p)| p.clone()).collect(),
        team_b: team_b.into_iter().map(|(_, p)| p.clone()).collect(),
        gap,
    })
}

/// Published splits by result message, so the move buttons know who to move.
#[derive(Default)]
pub struct SplitRegistry {
    splits: DashMap<u64, (TeamSplit, DateTime<Utc>)>,
}

impl SplitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, message_id: u64, split: TeamSplit, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(SPLIT_RETENTION_HOURS);
        self.splits.retain(|_, (_, at)| *at > cutoff);
        self.splits.insert(message_id, (split, now));
    }

    pub fn members(&self, message_id: u64, team: Team) -> Option<Vec<u64>> {
        self.splits
            .get(&message_id)
            .map(|entry| entry.0.members(team))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(label: &str, mmr: i32) -> BalancePlayer {
        BalancePlayer {
            label: label.to_string(),
            member_id: Some(mmr as u64),
            mmr,
        }
    }

    #[test]
    fn ten_players_split_five_five_with_the_smallest_gap() {
        let players: Vec<_> = [2400, 2100, 1900, 1800, 1500, 1400, 1300, 1200, 1000, 900]
            .iter()
            .enumerate()
            .map(|(i, mmr)| player(&format!("p{i}"), *mmr))
            .collect();

        let split = balance_teams(&players).unwrap();
        assert_eq!(split.team_a.len(), 5);
        assert_eq!(split.team_b.len(), 5);
        assert_eq!(split.gap, (split.total(Team::A) - split.total(Team::B)).abs());
        // 15500 total; every rating is a multiple of 100 so 7750 a side is out
        // of reach and 100 is the best possible gap.
        assert_eq!(split.gap, 100);
        assert!(split.team_a.contains(&players[0]));
    }

    #[test]
    fn exact_balance_is_found() {
        let players = vec![
            player("a", 10),
            player("b", 20),
            player("c", 30),
            player("d", 40),
        ];
        let split = balance_teams(&players).unwrap();
        assert_eq!(split.gap, 0);
        assert_eq!(split.team_a, vec![players[0].clone(), players[3].clone()]);
    }

    #[test]
    fn odd_counts_give_team_b_the_extra_player() {
        let players = vec![player("a", 100), player("b", 60), player("c", 50)];
        let split = balance_teams(&players).unwrap();
        assert_eq!(split.team_a.len(), 1);
        assert_eq!(split.team_b.len(), 2);
        assert_eq!(split.gap, 10);
    }

    #[test]
    fn player_count_is_bounded() {
        assert_eq!(
            balance_teams(&[player("a", 1)]),
            Err(BalanceError::TooFewPlayers(1))
        );
        let eleven: Vec<_> = (0..11).map(|i| player("x", i)).collect();
        assert_eq!(balance_teams(&eleven), Err(BalanceError::TooManyPlayers(11)));
    }

    #[test]
    fn placeholders_are_not_moved() {
        let players = vec![
            player("a", 500),
            BalancePlayer {
                label: "Bot 1".to_string(),
                member_id: None,
                mmr: PLACEHOLDER_MMR,
            },
        ];
        let split = balance_teams(&players).unwrap();
        assert_eq!(split.members(Team::A), vec![500]);
        assert!(split.members(Team::B).is_empty());
    }

    #[test]
    fn registry_forgets_old_splits() {
        let registry = SplitRegistry::new();
        let split = balance_teams(&[player("a", 1), player("b", 2)]).unwrap();
        let now = Utc::now();

        registry.remember(1, split.clone(), now - Duration::hours(SPLIT_RETENTION_HOURS + 1));
        registry.remember(2, split, now);

        assert_eq!(registry.members(1, Team::A), None);
        assert_eq!(registry.members(2, Team::A), Some(vec![1]));
    }
}
