// Persisted board messages (leaderboards and daily-claim panels).
//
// A board is edited in place when its stored message still exists and
// reposted otherwise. Refreshes are single-flight per board, throttled by a
// `RefreshGate`, skipped when nothing changed and retried with backoff when
// Discord rate limits us.

use crate::core::boards::{
    RefreshGate, COIN_LEADERBOARD, DAILY_COINS_PANEL, DAILY_XP_PANEL, MMR_LEADERBOARD,
    XP_LEADERBOARD,
};
use crate::core::economy::DailyClaimOutcome;
use crate::core::leveling::DailyBonusOutcome;
use crate::core::timezones::{format_hours_minutes, time_until_reset};
use crate::discord::commands::{format_number, reply_ephemeral};
use crate::discord::leveling::{announce_level_up, is_booster};
use crate::discord::{Context, Data, Error};
use anyhow::Context as _;
use chrono::Utc;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DAILY_COINS_BUTTON: &str = "daily:coins";
pub const DAILY_XP_BUTTON: &str = "daily:xp";

const MAX_ATTEMPTS: usize = 4;

#[derive(Default)]
pub struct BoardGates {
    gates: DashMap<&'static str, Arc<Mutex<RefreshGate>>>,
}

impl BoardGates {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, key: &'static str) -> Arc<Mutex<RefreshGate>> {
        self.gates.entry(key).or_default().clone()
    }
}

/// What a board should currently show.
struct BoardContent {
    embed: serenity::CreateEmbed,
    components: Vec<serenity::CreateActionRow>,
    fingerprint: String,
}

fn is_rate_limited(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(resp))
            if resp.status_code.as_u16() == 429
    )
}

async fn upsert_board(
    ctx: &serenity::Context,
    data: &Data,
    key: &'static str,
    channel_id: u64,
    content: BoardContent,
    force: bool,
) -> anyhow::Result<()> {
    let gate = data.board_gates.gate(key);
    let Ok(mut gate) = gate.try_lock() else {
        tracing::debug!(key, "Board refresh already running");
        return Ok(());
    };
    if !gate.should_refresh(Utc::now(), &content.fingerprint, force) {
        return Ok(());
    }

    let channel = serenity::ChannelId::new(channel_id);
    for attempt in 1..=MAX_ATTEMPTS {
        match publish(ctx, data, key, channel, &content).await {
            Ok(()) => {
                gate.record_success(Utc::now(), content.fingerprint);
                return Ok(());
            }
            Err(e) if is_rate_limited(&e) && attempt < MAX_ATTEMPTS => {
                let wait = gate.record_rate_limited();
                tracing::warn!(key, ?wait, "Board refresh rate limited, backing off");
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e).with_context(|| format!("publishing board {key}")),
        }
    }
    Ok(())
}

async fn publish(
    ctx: &serenity::Context,
    data: &Data,
    key: &'static str,
    channel: serenity::ChannelId,
    content: &BoardContent,
) -> Result<(), serenity::Error> {
    let stored = data.boards.message_id(key).await.unwrap_or_else(|e| {
        tracing::warn!(key, "Could not read board message id: {e}");
        None
    });

    if let Some(message_id) = stored {
        let edit = serenity::EditMessage::new()
            .embed(content.embed.clone())
            .components(content.components.clone());
        match channel
            .edit_message(ctx, serenity::MessageId::new(message_id), edit)
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if is_rate_limited(&e) => return Err(e),
            Err(e) => tracing::info!(key, "Board message gone, reposting: {e}"),
        }
    }

    let message = channel
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .embed(content.embed.clone())
                .components(content.components.clone()),
        )
        .await?;
    if let Err(e) = data.boards.remember(key, message.id.get()).await {
        tracing::warn!(key, "Could not store board message id: {e}");
    }
    Ok(())
}

fn medal(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("`#{n}`"),
    }
}

fn plain_board(title: &str, description: String, color: u32) -> BoardContent {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .description(description.clone())
        .color(color)
        .timestamp(serenity::Timestamp::now());
    BoardContent {
        embed,
        components: Vec::new(),
        fingerprint: description,
    }
}

// ============================================================================
// LEADERBOARDS
// ============================================================================

pub async fn refresh_coin_board(
    ctx: &serenity::Context,
    data: &Data,
    force: bool,
) -> anyhow::Result<()> {
    let Some(channel_id) = data.config.channels.coin else {
        return Ok(());
    };
    let page = data.economy.leaderboard_page(1).await?;
    let description = if page.entries.is_empty() {
        "Nobody has any coins yet.".to_string()
    } else {
        page.entries
            .iter()
            .enumerate()
            .map(|(i, (user, balance))| {
                format!("{} <@{user}> · 🪙 {}", medal(i + 1), format_number(*balance))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let content = plain_board("💰 Coin Leaderboard", description, 0xFFD700);
    upsert_board(ctx, data, COIN_LEADERBOARD, channel_id, content, force).await
}

pub async fn refresh_xp_board(
    ctx: &serenity::Context,
    data: &Data,
    force: bool,
) -> anyhow::Result<()> {
    let Some(channel_id) = data.config.channels.xp else {
        return Ok(());
    };
    let top = data.leveling.leaderboard(10).await?;
    let description = if top.is_empty() {
        "No XP earned yet.".to_string()
    } else {
        top.iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{} <@{}> · Level {} ({}/{} XP)",
                    medal(i + 1),
                    p.user_id,
                    p.level,
                    p.xp,
                    p.needed()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let content = plain_board("📊 XP Leaderboard", description, 0x5865F2);
    upsert_board(ctx, data, XP_LEADERBOARD, channel_id, content, force).await
}

pub async fn refresh_mmr_board(
    ctx: &serenity::Context,
    data: &Data,
    force: bool,
) -> anyhow::Result<()> {
    let Some(channel_id) = data.config.channels.mmr else {
        return Ok(());
    };
    let top = data.valorant.leaderboard(10).await?;
    let description = if top.is_empty() {
        "No linked players yet. Use `/link`.".to_string()
    } else {
        top.iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{} <@{}> `{}` · **{}** MMR",
                    medal(i + 1),
                    p.discord_id,
                    p.riot_id(),
                    p.visible_mmr
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let content = plain_board("🏆 Valorant MMR Leaderboard", description, 0xFD4556);
    upsert_board(ctx, data, MMR_LEADERBOARD, channel_id, content, force).await
}

// ============================================================================
// DAILY PANELS
// ============================================================================

fn daily_panel(title: &str, body: &str, button_id: &str, label: &str) -> BoardContent {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .description(body)
        .color(0x57F287)
        .footer(serenity::CreateEmbedFooter::new(
            "Resets every day at midnight New York time",
        ));
    let components = vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(button_id)
            .label(label)
            .style(serenity::ButtonStyle::Success),
    ])];
    BoardContent {
        embed,
        components,
        fingerprint: format!("{title}|{body}"),
    }
}

pub async fn post_daily_panels(
    ctx: &serenity::Context,
    data: &Data,
    force: bool,
) -> anyhow::Result<()> {
    if let Some(channel_id) = data.config.channels.daily_coins {
        let body = format!(
            "Press the button once a day to collect **{} coins**.",
            data.economy.config().daily_reward
        );
        let panel = daily_panel("🪙 Daily Coins", &body, DAILY_COINS_BUTTON, "Claim coins");
        upsert_board(ctx, data, DAILY_COINS_PANEL, channel_id, panel, force).await?;
    }
    if let Some(channel_id) = data.config.channels.xp {
        let body = format!(
            "Press the button once a day to collect **{} XP**.",
            crate::core::leveling::DAILY_BONUS_XP
        );
        let panel = daily_panel("✨ Daily XP", &body, DAILY_XP_BUTTON, "Claim XP");
        upsert_board(ctx, data, DAILY_XP_PANEL, channel_id, panel, force).await?;
    }
    Ok(())
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    text: String,
) -> Result<(), serenity::Error> {
    interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await
}

/// Handles the persistent claim buttons on the daily panels.
pub async fn handle_daily_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let user_id = interaction.user.id.get();
    let now = Utc::now();

    match interaction.data.custom_id.as_str() {
        DAILY_COINS_BUTTON => {
            let text = match data.economy.claim_daily(user_id, now).await? {
                DailyClaimOutcome::Claimed {
                    awarded,
                    new_balance,
                } => {
                    data.audit
                        .send(&ctx.http, format!("<@{user_id}> claimed {awarded} daily coins"))
                        .await;
                    format!(
                        "✅ You received **{awarded} coins**! Balance: 🪙 {}",
                        format_number(new_balance)
                    )
                }
                DailyClaimOutcome::AlreadyClaimed { retry_in } => format!(
                    "⏰ Already claimed today. Next claim in {}.",
                    format_hours_minutes(retry_in)
                ),
            };
            respond_ephemeral(ctx, interaction, text).await?;
            if let Err(e) = refresh_coin_board(ctx, data, false).await {
                tracing::warn!("Coin board refresh failed: {e:#}");
            }
        }
        DAILY_XP_BUTTON => {
            let boosted = interaction
                .member
                .as_ref()
                .is_some_and(|m| is_booster(data, &m.roles));
            let text = match data.leveling.claim_daily_bonus(user_id, boosted, now).await? {
                DailyBonusOutcome::Granted { amount, level_up } => {
                    if let Some(level_up) = level_up {
                        announce_level_up(ctx, data, &level_up).await;
                    }
                    format!("✅ You received **{amount} XP**!")
                }
                DailyBonusOutcome::AlreadyClaimed => format!(
                    "⏰ Already claimed today. Next claim in {}.",
                    format_hours_minutes(time_until_reset(now))
                ),
            };
            respond_ephemeral(ctx, interaction, text).await?;
            if let Err(e) = refresh_xp_board(ctx, data, false).await {
                tracing::warn!("XP board refresh failed: {e:#}");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Post the daily panels and force every leaderboard to refresh.
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn panels(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let sctx = ctx.serenity_context();
    let data = ctx.data();

    post_daily_panels(sctx, data, true).await?;
    refresh_coin_board(sctx, data, true).await?;
    refresh_xp_board(sctx, data, true).await?;
    refresh_mmr_board(sctx, data, true).await?;

    reply_ephemeral(ctx, "✅ Panels and leaderboards posted.").await
}
