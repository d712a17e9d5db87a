// Discord commands module.
// Each feature gets its own command file; the shared `Data` lives here.

pub mod autobalance;
pub mod betting;
pub mod casino;
pub mod crash;
pub mod custom_game;
pub mod economy;
pub mod leveling;
pub mod party;
pub mod presence;
pub mod shop;
pub mod tickets;
pub mod valorant;

use crate::config::BotConfig;
use crate::core::autobalance::SplitRegistry;
use crate::core::betting::BettingService;
use crate::core::boards::BoardService;
use crate::core::casino::CasinoService;
use crate::core::crash::CrashService;
use crate::core::custom_game::CustomGameService;
use crate::core::economy::EconomyService;
use crate::core::leveling::LevelingService;
use crate::core::party::PartyBoard;
use crate::core::reactions::ReactionRoleRegistry;
use crate::core::shop::ShopService;
use crate::core::valorant::ValorantService;
use crate::core::voice::TempVoiceRegistry;
use crate::discord::boards::BoardGates;
use crate::discord::logging::AuditLog;
use crate::infra::boards::PostgresBotConfigStore;
use crate::infra::economy::PostgresCoinStore;
use crate::infra::google_sheets::GoogleSheetsClient;
use crate::infra::leveling::PostgresXpStore;
use crate::infra::valorant::{HenrikClient, PostgresPlayerStore};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type Economy = EconomyService<PostgresCoinStore>;
pub type Valorant = ValorantService<HenrikClient, PostgresPlayerStore>;

/// Everything commands and event handlers share. Cheap to clone so
/// background tasks can take their own copy.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<BotConfig>,
    pub economy: Arc<Economy>,
    pub leveling: Arc<LevelingService<PostgresXpStore>>,
    pub casino: Arc<CasinoService<PostgresCoinStore>>,
    pub crash: Arc<CrashService<PostgresCoinStore>>,
    pub betting: Arc<BettingService<PostgresCoinStore>>,
    pub shop: Arc<ShopService<PostgresCoinStore>>,
    pub valorant: Arc<Valorant>,
    pub custom_game: Arc<CustomGameService>,
    /// Balanced teams waiting on their move buttons, by result message.
    pub splits: Arc<SplitRegistry>,
    pub parties: Arc<PartyBoard>,
    pub temp_voice: Arc<TempVoiceRegistry>,
    pub reaction_roles: Arc<ReactionRoleRegistry>,
    pub boards: Arc<BoardService<PostgresBotConfigStore>>,
    pub board_gates: Arc<BoardGates>,
    pub sheets: Option<Arc<GoogleSheetsClient>>,
    pub audit: AuditLog,
    /// Held while a full MMR refresh runs so runs never overlap.
    pub mmr_refresh: Arc<tokio::sync::Mutex<()>>,
}

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        economy::balance(),
        economy::daily(),
        economy::coins(),
        economy::tip(),
        economy::leaderboard(),
        leveling::xp(),
        leveling::xpmodify(),
        leveling::dailyxp(),
        leveling::xpleaderboard(),
        casino::slots(),
        casino::coinflip(),
        casino::roulette(),
        casino::dice(),
        casino::rps(),
        casino::blackjack(),
        crash::crash(),
        betting::createbet(),
        betting::cancelbet(),
        betting::closebet(),
        valorant::link(),
        valorant::rank(),
        valorant::recent(),
        valorant::mmr(),
        custom_game::customgame(),
        autobalance::autobalance(),
        party::party(),
        shop::shoppanel(),
        tickets::help(),
        crate::discord::boards::panels(),
        crate::discord::events::entry::entrypanel(),
    ]
}

/// Reply only the invoking user can see.
pub async fn reply_ephemeral(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(text)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Casino games are pinned to their channel when one is configured. Returns
/// false (after telling the user) when the command was used elsewhere.
pub async fn ensure_channel(ctx: Context<'_>, required: Option<u64>) -> Result<bool, Error> {
    match required {
        Some(channel) if ctx.channel_id().get() != channel => {
            reply_ephemeral(ctx, format!("This game can only be played in <#{channel}>.")).await?;
            Ok(false)
        }
        _ => Ok(true),
    }
}

/// Role IDs of the invoking member, empty outside guilds.
pub async fn author_roles(ctx: Context<'_>) -> Vec<u64> {
    ctx.author_member()
        .await
        .map(|m| m.roles.iter().map(|r| r.get()).collect::<Vec<_>>())
        .unwrap_or_default()
}

/// Interaction response only the clicking user sees.
pub fn ephemeral(text: impl Into<String>) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    )
}

/// Trimmed value of the text input `id` in a submitted modal, empty if absent.
pub fn input_value(rows: &[serenity::ActionRow], id: &str) -> String {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            serenity::ActionRowComponent::InputText(text) if text.custom_id == id => {
                Some(text.value.clone().unwrap_or_default().trim().to_string())
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Format a number with commas for readability
pub fn format_number(n: i64) -> String {
    let s = n.to_string();
    let negative = s.starts_with('-');
    let s = if negative { &s[1..] } else { &s };

    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }

    if negative {
        result.insert(0, '-');
    }

    result
}

pub fn signed(n: i64) -> String {
    if n >= 0 {
        format!("+{}", format_number(n))
    } else {
        format_number(n)
    }
}
