// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Postgres, Henrik API, Google Sheets)
// - `discord/` = Discord-specific adapters (commands, events, background loops)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::{BotConfig, ServiceAccountSource};
use crate::core::autobalance::SplitRegistry;
use crate::core::betting::BettingService;
use crate::core::boards::BoardService;
use crate::core::casino::CasinoService;
use crate::core::crash::CrashService;
use crate::core::custom_game::CustomGameService;
use crate::core::economy::{EconomyConfig, EconomyService};
use crate::core::leveling::LevelingService;
use crate::core::party::PartyBoard;
use crate::core::reactions::ReactionRoleRegistry;
use crate::core::shop::ShopService;
use crate::core::valorant::ValorantService;
use crate::core::voice::TempVoiceRegistry;
use crate::discord::boards::{post_daily_panels, BoardGates};
use crate::discord::commands::shop::post_shop_panel;
use crate::discord::events::{entry::post_entry_panel, event_handler, reactions};
use crate::discord::logging::{on_error, AuditLog};
use crate::discord::{Data, Error};
use crate::infra::database;
use crate::infra::google_sheets::{GoogleSheetsClient, ServiceAccountAuth, SHEETS_READONLY_SCOPE};
use crate::infra::valorant::HenrikClient;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

async fn sheets_client(config: &BotConfig) -> anyhow::Result<Option<Arc<GoogleSheetsClient>>> {
    let auth = match &config.google_service_account {
        Some(ServiceAccountSource::KeyFile(path)) => {
            ServiceAccountAuth::from_file(path, SHEETS_READONLY_SCOPE).await?
        }
        Some(ServiceAccountSource::Json(json)) => {
            ServiceAccountAuth::from_json(json, SHEETS_READONLY_SCOPE)?
        }
        None => return Ok(None),
    };
    tracing::info!(client_email = auth.client_email(), "Google Sheets access configured");
    Ok(Some(Arc::new(GoogleSheetsClient::new(auth))))
}

/// Wire every service onto the shared pool.
async fn build_data(config: BotConfig) -> anyhow::Result<Data> {
    let pool = database::connect(&config.database_url).await?;
    let stores = database::open_stores(&pool).await?;
    tracing::info!("Database ready");

    let economy = Arc::new(EconomyService::new_with_config(
        stores.coins,
        EconomyConfig {
            daily_reward: config.daily_coins_amount,
            ..EconomyConfig::default()
        },
    ));
    let henrik = HenrikClient::new(config.henrik_api_key.clone())
        .context("building the Henrik API client")?;
    if config.henrik_api_key.is_none() {
        tracing::warn!("HENRIK_API_KEY not set, Valorant requests may be rejected");
    }
    let sheets = sheets_client(&config).await?;

    Ok(Data {
        leveling: Arc::new(LevelingService::new(stores.xp)),
        casino: Arc::new(CasinoService::new(Arc::clone(&economy))),
        crash: Arc::new(CrashService::new(Arc::clone(&economy))),
        betting: Arc::new(BettingService::new(Arc::clone(&economy))),
        shop: Arc::new(ShopService::new(Arc::clone(&economy))),
        economy,
        valorant: Arc::new(ValorantService::new(
            henrik,
            stores.players,
            config.valorant_region.clone(),
        )),
        custom_game: Arc::new(CustomGameService::new(
            config.roles.custom_game_admins.clone(),
        )),
        splits: Arc::new(SplitRegistry::new()),
        parties: Arc::new(PartyBoard::new()),
        temp_voice: Arc::new(TempVoiceRegistry::new()),
        reaction_roles: Arc::new(ReactionRoleRegistry::from_bindings(&config.reaction_roles)),
        boards: Arc::new(BoardService::new(stores.bot_config)),
        board_gates: Arc::new(BoardGates::new()),
        sheets,
        audit: AuditLog::new(config.channels.log),
        mmr_refresh: Arc::new(tokio::sync::Mutex::new(())),
        config: Arc::new(config),
    })
}

/// One-off work once the gateway is up: panels, reactions and loops.
async fn on_startup(ctx: &serenity::Context, data: &Data) {
    reactions::sync_reaction_messages(ctx, data).await;
    if let Err(e) = post_entry_panel(ctx, data).await {
        tracing::warn!("Entry panel not posted: {e:#}");
    }
    if let Err(e) = post_daily_panels(ctx, data, true).await {
        tracing::warn!("Daily panels not posted: {e:#}");
    }
    if let Err(e) = post_shop_panel(ctx, data).await {
        tracing::warn!("Shop panel not posted: {e:#}");
    }
    discord::tasks::spawn_all(ctx, data);
    data.audit.send(&ctx.http, "Bot started").await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env()?;
    let token = config.discord_token.clone();
    let data = build_data(config).await?;

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_PRESENCES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        command = %ctx.command().qualified_name,
                        user_id = ctx.author().id.get(),
                        "Command invoked"
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(
                    count = framework.options().commands.len(),
                    "Commands registered"
                );
                on_startup(ctx, &data).await;
                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("creating the Discord client")?;

    client.start().await.context("running the Discord client")?;
    Ok(())
}
