// Runtime configuration, read once from the environment (after `.env` is
// loaded) into a typed struct that the Discord layer shares through `Data`.

use crate::core::reactions::ReactionRoleBinding;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} is not valid JSON: {reason}")]
    InvalidJson { name: &'static str, reason: String },
}

/// Where the Google service account key comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceAccountSource {
    KeyFile(String),
    Json(String),
}

/// Channel IDs for every feature. Unset channels disable the feature that
/// posts there (or, for casino games, allow the game anywhere).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelConfig {
    pub log: Option<u64>,
    pub help: Option<u64>,
    pub ticket_category: Option<u64>,
    pub ticket_history: Option<u64>,
    pub welcome: Option<u64>,
    pub leave: Option<u64>,
    pub rules: Option<u64>,
    pub role_assign: Option<u64>,
    pub announcements: Option<u64>,
    pub xp: Option<u64>,
    pub levelup: Option<u64>,
    pub coin: Option<u64>,
    pub daily_coins: Option<u64>,
    pub slots: Option<u64>,
    pub blackjack: Option<u64>,
    pub crash: Option<u64>,
    pub coinflip: Option<u64>,
    pub dice_duel: Option<u64>,
    pub roulette: Option<u64>,
    pub rps: Option<u64>,
    pub custom_game_voice: Option<u64>,
    pub entry_button: Option<u64>,
    pub entry_log: Option<u64>,
    pub temp_voice_hub: Option<u64>,
    pub mmr: Option<u64>,
    pub team_a_voice: Option<u64>,
    pub team_b_voice: Option<u64>,
    pub party: Option<u64>,
    pub party_category: Option<u64>,
    pub anon_board: Option<u64>,
    pub anon_log: Option<u64>,
    pub shop: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleConfig {
    pub support: Option<u64>,
    pub custom_game: Option<u64>,
    pub custom_game_admins: Vec<u64>,
    pub unverified: Option<u64>,
    pub temp_voice_view: Option<u64>,
    pub xp_booster: Option<u64>,
    pub valorant: Option<u64>,
    /// Tier name (e.g. "Gold") to the role pinged for party posts.
    pub tiers: BTreeMap<String, u64>,
    /// Shop label to nickname color role.
    pub colors: BTreeMap<String, u64>,
    /// Custom shop roles are placed just above this role.
    pub shop_anchor: Option<u64>,
    pub store_access: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub discord_token: String,
    pub database_url: String,
    pub henrik_api_key: Option<String>,
    pub valorant_region: String,
    pub daily_coins_amount: i64,
    pub channels: ChannelConfig,
    pub roles: RoleConfig,
    /// Receives a copy of every anonymous post.
    pub admin_user_id: Option<u64>,
    pub reaction_roles: Vec<ReactionRoleBinding>,
    pub google_service_account: Option<ServiceAccountSource>,
    pub player_sheet_id: Option<String>,
    pub player_sheet_range: String,
}

const DEFAULT_REGION: &str = "na";
const DEFAULT_DAILY_COINS: i64 = 100;
const DEFAULT_SHEET_RANGE: &str = "A1:D";

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let id = |name: &'static str| parse_id(name, get(name));

        let channels = ChannelConfig {
            log: id("LOG_CHANNEL_ID")?,
            help: id("HELP_CHANNEL_ID")?,
            ticket_category: id("TICKET_CATEGORY_ID")?,
            ticket_history: id("TICKET_HISTORY_CHANNEL_ID")?,
            welcome: id("WELCOME_CHANNEL_ID")?,
            leave: id("LEAVE_CHANNEL_ID")?,
            rules: id("RULES_CHANNEL_ID")?,
            role_assign: id("ROLE_ASSIGN_CHANNEL_ID")?,
            announcements: id("ANNOUNCEMENTS_CHANNEL_ID")?,
            xp: id("XP_CHANNEL_ID")?,
            levelup: id("LEVELUP_CHANNEL_ID")?,
            coin: id("COIN_CHANNEL_ID")?,
            daily_coins: id("DAILY_COINS_CHANNEL_ID")?,
            slots: id("SLOTS_CHANNEL_ID")?,
            blackjack: id("BLACKJACK_CHANNEL_ID")?,
            crash: id("CRASH_CHANNEL_ID")?,
            coinflip: id("COINFLIP_CHANNEL_ID")?,
            dice_duel: id("DICE_DUEL_CHANNEL_ID")?,
            roulette: id("ROULETTE_CHANNEL_ID")?,
            rps: id("RPS_CHANNEL_ID")?,
            custom_game_voice: id("CUSTOM_GAME_VOICE_CHANNEL_ID")?,
            entry_button: id("ENTRY_BUTTON_CHANNEL_ID")?,
            entry_log: id("ENTRY_LOG_CHANNEL_ID")?,
            temp_voice_hub: id("TEMP_VOICE_HUB_CHANNEL_ID")?,
            mmr: id("MMR_CHANNEL_ID")?,
            team_a_voice: id("TEAM_A_VOICE_CHANNEL_ID")?,
            team_b_voice: id("TEAM_B_VOICE_CHANNEL_ID")?,
            party: id("PARTY_CHANNEL_ID")?,
            party_category: id("PARTY_CATEGORY_ID")?,
            anon_board: id("ANON_BOARD_CHANNEL_ID")?,
            anon_log: id("ANON_LOG_CHANNEL_ID")?,
            shop: id("SHOP_CHANNEL_ID")?,
        };

        let roles = RoleConfig {
            support: id("SUPPORT_ROLE_ID")?,
            custom_game: id("CUSTOM_GAME_ROLE_ID")?,
            custom_game_admins: parse_json_or_default(
                "CUSTOM_GAME_ADMIN_ROLE_IDS",
                get("CUSTOM_GAME_ADMIN_ROLE_IDS"),
            )?,
            unverified: id("UNVERIFIED_ROLE_ID")?,
            temp_voice_view: id("TEMP_VOICE_VIEW_ROLE_ID")?,
            xp_booster: id("XP_BOOSTER_ROLE_ID")?,
            valorant: id("VALORANT_ROLE_ID")?,
            tiers: parse_json_or_default("TIER_ROLE_IDS", get("TIER_ROLE_IDS"))?,
            colors: parse_json_or_default("COLOR_ROLES", get("COLOR_ROLES"))?,
            shop_anchor: id("SHOP_ANCHOR_ROLE_ID")?,
            store_access: id("STORE_ROLE_ID")?,
        };

        let google_service_account = match (
            get("GOOGLE_SERVICE_ACCOUNT_KEY"),
            get("GOOGLE_SERVICE_ACCOUNT_JSON"),
        ) {
            (Some(path), _) => Some(ServiceAccountSource::KeyFile(path)),
            (None, Some(json)) => Some(ServiceAccountSource::Json(json)),
            (None, None) => None,
        };

        let daily_coins_amount = match get("DAILY_COINS_AMOUNT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                name: "DAILY_COINS_AMOUNT",
                value: raw,
            })?,
            None => DEFAULT_DAILY_COINS,
        };

        Ok(Self {
            discord_token: get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            henrik_api_key: get("HENRIK_API_KEY"),
            valorant_region: get("VALORANT_REGION")
                .map(|r| r.to_lowercase())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            daily_coins_amount,
            channels,
            roles,
            admin_user_id: id("ADMIN_USER_ID")?,
            reaction_roles: parse_json_or_default("REACTION_ROLES", get("REACTION_ROLES"))?,
            google_service_account,
            player_sheet_id: get("PLAYER_SHEET_ID"),
            player_sheet_range: get("PLAYER_SHEET_RANGE")
                .unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
        })
    }
}

fn parse_id(name: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { name, value })
    })
    .transpose()
}

fn parse_json_or_default<T>(name: &'static str, raw: Option<String>) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match raw {
        Some(json) => serde_json::from_str(&json).map_err(|e| ConfigError::InvalidJson {
            name,
            reason: e.to_string(),
        }),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DISCORD_TOKEN", "token"),
        ("DATABASE_URL", "postgres://localhost/studio"),
    ];

    #[test]
    fn defaults_apply_when_optional_values_are_unset() {
        let config = config_from(&REQUIRED).unwrap();
        assert_eq!(config.valorant_region, "na");
        assert_eq!(config.daily_coins_amount, 100);
        assert_eq!(config.player_sheet_range, "A1:D");
        assert_eq!(config.channels, ChannelConfig::default());
        assert!(config.roles.custom_game_admins.is_empty());
        assert!(config.reaction_roles.is_empty());
        assert!(config.google_service_account.is_none());
    }

    #[test]
    fn missing_token_is_reported() {
        let err = config_from(&[("DATABASE_URL", "postgres://x")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DISCORD_TOKEN"));
    }

    #[test]
    fn bad_channel_id_names_the_variable() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CRASH_CHANNEL_ID", "#crash"));
        let err = config_from(&vars).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: "CRASH_CHANNEL_ID",
                value: "#crash".to_string()
            }
        );
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LOG_CHANNEL_ID", "  "));
        vars.push(("VALORANT_REGION", ""));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.channels.log, None);
        assert_eq!(config.valorant_region, "na");
    }

    #[test]
    fn json_lists_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CUSTOM_GAME_ADMIN_ROLE_IDS", "[111, 222]"));
        vars.push((
            "REACTION_ROLES",
            r#"[{"channel_id": 5, "message_id": 9, "roles": {"🎮": [42]}}]"#,
        ));
        vars.push(("VALORANT_REGION", "EU"));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.roles.custom_game_admins, vec![111, 222]);
        assert_eq!(config.reaction_roles.len(), 1);
        assert_eq!(config.reaction_roles[0].message_id, 9);
        assert_eq!(config.valorant_region, "eu");
    }

    #[test]
    fn role_maps_and_feature_channels_are_read() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TIER_ROLE_IDS", r#"{"Gold": 31, "Iron": 30}"#));
        vars.push(("COLOR_ROLES", r#"{"Red": 40}"#));
        vars.push(("TEAM_A_VOICE_CHANNEL_ID", "7"));
        vars.push(("ANON_BOARD_CHANNEL_ID", "8"));
        vars.push(("ADMIN_USER_ID", "99"));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.roles.tiers.get("Gold"), Some(&31));
        assert_eq!(config.roles.tiers.len(), 2);
        assert_eq!(config.roles.colors.get("Red"), Some(&40));
        assert_eq!(config.channels.team_a_voice, Some(7));
        assert_eq!(config.channels.team_b_voice, None);
        assert_eq!(config.channels.anon_board, Some(8));
        assert_eq!(config.admin_user_id, Some(99));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CUSTOM_GAME_ADMIN_ROLE_IDS", "111,222"));
        assert!(matches!(
            config_from(&vars),
            Err(ConfigError::InvalidJson {
                name: "CUSTOM_GAME_ADMIN_ROLE_IDS",
                ..
            })
        ));
    }

    #[test]
    fn key_file_wins_over_inline_json() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("GOOGLE_SERVICE_ACCOUNT_KEY", "/etc/studio/key.json"));
        vars.push(("GOOGLE_SERVICE_ACCOUNT_JSON", "{}"));
        let config = config_from(&vars).unwrap();
        assert_eq!(
            config.google_service_account,
            Some(ServiceAccountSource::KeyFile("/etc/studio/key.json".into()))
        );
    }
}
