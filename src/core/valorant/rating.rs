// MMR heuristics. The competitive score comes from the player's current tier,
// the hidden rating from their recent match performance.

use super::henrik_models::MatchData;
use chrono::{DateTime, TimeZone, Utc};

pub const TIERS: [&str; 25] = [
    "Iron 1",
    "Iron 2",
    "Iron 3",
    "Bronze 1",
    "Bronze 2",
    "Bronze 3",
    "Silver 1",
    "Silver 2",
    "Silver 3",
    "Gold 1",
    "Gold 2",
    "Gold 3",
    "Platinum 1",
    "Platinum 2",
    "Platinum 3",
    "Diamond 1",
    "Diamond 2",
    "Diamond 3",
    "Ascendant 1",
    "Ascendant 2",
    "Ascendant 3",
    "Immortal 1",
    "Immortal 2",
    "Immortal 3",
    "Radiant",
];

pub const BASE_RATING: i32 = 1000;
pub const BASE_RD: f64 = 350.0;
pub const BASE_VOLATILITY: f64 = 0.06;

/// Tier index * 300 + RR. Unknown tiers count as 0 plus RR.
pub fn tier_to_score(tier: &str, rr: i32) -> i32 {
    let base = TIERS
        .iter()
        .position(|t| *t == tier)
        .map(|i| i as i32 * 300)
        .unwrap_or(0);
    base + rr
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HiddenRating {
    pub win_mmr: i32,
    pub rd: f64,
    pub volatility: f64,
    pub encounter_mmr: i32,
}

impl Default for HiddenRating {
    fn default() -> Self {
        Self {
            win_mmr: BASE_RATING,
            rd: BASE_RD,
            volatility: BASE_VOLATILITY,
            encounter_mmr: BASE_RATING,
        }
    }
}

/// Hidden rating over the matches `puuid` appears in. Matches without the
/// player are skipped; no matches at all yields the defaults.
pub fn hidden_rating(matches: &[MatchData], puuid: &str) -> HiddenRating {
    let mut perf_sum = 0.0;
    let mut encounter_sum = 0.0;
    let mut n = 0u32;

    for m in matches {
        let Some(player) = m.player(puuid) else {
            continue;
        };
        let kills = player.stats.kills as f64;
        let deaths = player.stats.deaths as f64;
        let assists = player.stats.assists as f64;
        let result_bonus = if m.team_won(&player.team) { 25.0 } else { -10.0 };

        perf_sum += kills + 0.7 * assists - 0.5 * deaths + result_bonus;
        encounter_sum += 1.5 * kills + 0.3 * assists;
        n += 1;
    }

    if n == 0 {
        return HiddenRating::default();
    }

    let n_f = n as f64;
    HiddenRating {
        win_mmr: (BASE_RATING as f64 + perf_sum / n_f).round() as i32,
        rd: BASE_RD,
        volatility: BASE_VOLATILITY,
        encounter_mmr: (BASE_RATING as f64 + encounter_sum / n_f).round() as i32,
    }
}

pub fn visible_mmr(competitive: i32, hidden_win: i32) -> i32 {
    (0.4 * competitive as f64 + 0.6 * hidden_win as f64).round() as i32
}

/// One match from a player's point of view, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchLine {
    pub match_id: String,
    pub map: String,
    pub agent: String,
    pub mode: String,
    pub won: bool,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
    pub score: i32,
    pub hs_pct: f64,
    pub adr: i64,
    pub tier: String,
    pub rounds: i32,
    pub started: String,
}

impl MatchLine {
    pub fn kda(&self) -> String {
        format!("{}/{}/{}", self.kills, self.deaths, self.assists)
    }

    pub fn tracker_url(&self) -> String {
        format!("https://tracker.gg/valorant/match/{}", self.match_id)
    }
}

/// Average damage per round, rounds clamped to at least one.
pub fn adr(damage: i64, rounds: i32) -> i64 {
    damage / i64::from(rounds.max(1))
}

pub fn summarize(m: &MatchData, puuid: &str) -> Option<MatchLine> {
    let player = m.player(puuid)?;
    let unknown = || "Unknown".to_string();

    Some(MatchLine {
        match_id: m.metadata.matchid.clone(),
        map: m.metadata.map.clone().unwrap_or_else(unknown),
        agent: player.character.clone().unwrap_or_else(|| "?".to_string()),
        mode: m.metadata.mode.clone().unwrap_or_else(unknown),
        won: m.team_won(&player.team),
        kills: player.stats.kills,
        deaths: player.stats.deaths,
        assists: player.stats.assists,
        score: player.stats.score,
        hs_pct: player.stats.headshot_pct(),
        adr: adr(player.damage_made, m.metadata.rounds_played),
        tier: player
            .currenttier_patched
            .clone()
            .unwrap_or_else(|| "?".to_string()),
        rounds: m.metadata.rounds_played,
        started: m
            .metadata
            .game_start_patched
            .clone()
            .unwrap_or_else(unknown),
    })
}

pub fn match_start(m: &MatchData) -> DateTime<Utc> {
    Utc.timestamp_opt(m.metadata.game_start, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::valorant::henrik_models::{MatchPlayer, PlayerStats, TeamResult};

    fn match_with(puuid: &str, team: &str, won: bool, k: i32, d: i32, a: i32) -> MatchData {
        let mut m = MatchData::default();
        m.players.all_players.push(MatchPlayer {
            puuid: puuid.to_string(),
            team: team.to_string(),
            stats: PlayerStats {
                kills: k,
                deaths: d,
                assists: a,
                ..Default::default()
            },
            ..Default::default()
        });
        m.teams.insert(
            team.to_lowercase(),
            TeamResult {
                has_won: won,
                rounds_won: 13,
            },
        );
        m
    }

    #[test]
    fn tier_scores() {
        assert_eq!(tier_to_score("Iron 1", 50), 50);
        assert_eq!(tier_to_score("Gold 2", 40), 10 * 300 + 40);
        assert_eq!(tier_to_score("Radiant", 0), 24 * 300);
        assert_eq!(tier_to_score("Unrated", 12), 12);
    }

    #[test]
    fn hidden_rating_defaults_without_matches() {
        let other = match_with("someone-else", "Red", true, 30, 5, 5);
        assert_eq!(hidden_rating(&[other], "me"), HiddenRating::default());
    }

    #[test]
    fn hidden_rating_averages_performance() {
        // win: 20 + 7 - 5 + 25 = 47; loss: 10 + 0 - 10 - 10 = -10; mean 18.5
        let matches = vec![
            match_with("me", "Red", true, 20, 10, 10),
            match_with("me", "Blue", false, 10, 20, 0),
        ];
        let rating = hidden_rating(&matches, "me");

        assert_eq!(rating.win_mmr, 1019);
        // (33 + 15) / 2 = 24
        assert_eq!(rating.encounter_mmr, 1024);
        assert_eq!(rating.rd, 350.0);
        assert_eq!(rating.volatility, 0.06);
    }

    #[test]
    fn visible_blends_competitive_and_hidden() {
        assert_eq!(visible_mmr(3040, 1019), 1827);
        assert_eq!(visible_mmr(1000, 1000), 1000);
    }

    #[test]
    fn summarize_reports_adr_and_result() {
        let mut m = match_with("me", "Red", true, 20, 10, 5);
        m.metadata.rounds_played = 20;
        m.metadata.matchid = "abc".into();
        m.players.all_players[0].damage_made = 3000;

        let line = summarize(&m, "me").unwrap();
        assert_eq!(line.adr, 150);
        assert!(line.won);
        assert_eq!(line.kda(), "20/10/5");
        assert_eq!(line.map, "Unknown");
        assert_eq!(line.tracker_url(), "https://tracker.gg/valorant/match/abc");
        assert!(summarize(&m, "other").is_none());
    }

    #[test]
    fn adr_never_divides_by_zero() {
        assert_eq!(adr(500, 0), 500);
    }
}
