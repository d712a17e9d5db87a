// Response shapes for the Henrik Valorant API. Only the fields the bot reads are
// modelled; everything is defaulted because the API omits fields freely.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct HenrikEnvelope<T> {
    #[serde(default)]
    pub status: Option<u16>,
    pub data: T,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccountData {
    pub puuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmrImages {
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MmrData {
    #[serde(default)]
    pub currenttierpatched: Option<String>,
    #[serde(default)]
    pub ranking_in_tier: i32,
    #[serde(default)]
    pub images: MmrImages,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchData {
    #[serde(default)]
    pub metadata: MatchMetadata,
    #[serde(default)]
    pub players: MatchPlayers,
    #[serde(default)]
    pub teams: HashMap<String, TeamResult>,
}

impl MatchData {
    pub fn player(&self, puuid: &str) -> Option<&MatchPlayer> {
        self.players.all_players.iter().find(|p| p.puuid == puuid)
    }

    /// Whether the team (`"Red"`, `"blue"`...) won this match.
    pub fn team_won(&self, team: &str) -> bool {
        self.teams
            .get(&team.to_lowercase())
            .map(|t| t.has_won)
            .unwrap_or(false)
    }

    pub fn rounds_won(&self, team: &str) -> i32 {
        self.teams.get(team).map(|t| t.rounds_won).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchMetadata {
    #[serde(default)]
    pub matchid: String,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub rounds_played: i32,
    /// Unix seconds.
    #[serde(default)]
    pub game_start: i64,
    #[serde(default)]
    pub game_start_patched: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPlayers {
    #[serde(default)]
    pub all_players: Vec<MatchPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchPlayer {
    pub puuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub currenttier_patched: Option<String>,
    #[serde(default)]
    pub stats: PlayerStats,
    #[serde(default)]
    pub damage_made: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub kills: i32,
    #[serde(default)]
    pub deaths: i32,
    #[serde(default)]
    pub assists: i32,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub headshots: i32,
    #[serde(default)]
    pub bodyshots: i32,
    #[serde(default)]
    pub legshots: i32,
}

impl PlayerStats {
    pub fn headshot_pct(&self) -> f64 {
        let shots = self.headshots + self.bodyshots + self.legshots;
        if shots > 0 {
            self.headshots as f64 * 100.0 / shots as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamResult {
    #[serde(default)]
    pub has_won: bool,
    #[serde(default)]
    pub rounds_won: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_payload_tolerates_missing_fields() {
        let raw = serde_json::json!({
            "metadata": { "matchid": "m-1", "map": "Ascent", "rounds_played": 20 },
            "players": { "all_players": [
                { "puuid": "p1", "team": "Red", "stats": { "kills": 20, "headshots": 5, "bodyshots": 15 } }
            ]},
            "teams": { "red": { "has_won": true, "rounds_won": 13 }, "blue": { "rounds_won": 7 } }
        });
        let parsed: MatchData = serde_json::from_value(raw).unwrap();

        let player = parsed.player("p1").unwrap();
        assert_eq!(player.stats.kills, 20);
        assert_eq!(player.stats.deaths, 0);
        assert_eq!(player.stats.headshot_pct(), 25.0);
        assert!(parsed.team_won("Red"));
        assert!(!parsed.team_won("Blue"));
        assert_eq!(parsed.rounds_won("blue"), 7);
        assert!(parsed.player("nobody").is_none());
    }
}
