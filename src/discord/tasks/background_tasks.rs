// Long-running loops started once the bot is ready. Each loop owns its own
// clone of the context and `Data` and never returns.

use crate::core::timezones::{next_midnight, MMR_REFRESH_TZ};
use crate::discord::boards::{refresh_coin_board, refresh_mmr_board};
use crate::discord::commands::custom_game::send_reminders;
use crate::discord::commands::shop::expire_shop_roles;
use crate::discord::commands::valorant::refresh_everyone;
use crate::discord::events::voice::{sweep_temp_channels, update_stats_channels};
use crate::discord::Data;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::time::Duration as StdDuration;
use tokio::time::sleep;

const HOURLY: StdDuration = StdDuration::from_secs(60 * 60);
const COIN_BOARD_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
const REMINDER_INTERVAL: StdDuration = StdDuration::from_secs(30);
const SHOP_EXPIRY_INTERVAL: StdDuration = StdDuration::from_secs(60);

pub fn spawn_all(ctx: &serenity::Context, data: &Data) {
    tokio::spawn(daily_mmr_update(ctx.clone(), data.clone()));
    tokio::spawn(hourly_mmr_board(ctx.clone(), data.clone()));
    tokio::spawn(coin_board_loop(ctx.clone(), data.clone()));
    tokio::spawn(custom_game_reminders(ctx.clone(), data.clone()));
    tokio::spawn(hourly_voice_upkeep(ctx.clone(), data.clone()));
    tokio::spawn(shop_expiry_loop(ctx.clone(), data.clone()));
    tracing::info!("Background tasks started");
}

/// Full MMR refresh every day at midnight Toronto time.
async fn daily_mmr_update(ctx: serenity::Context, data: Data) {
    loop {
        let now = Utc::now();
        let next = next_midnight(now, MMR_REFRESH_TZ);
        let wait = (next - now).to_std().unwrap_or(HOURLY);
        tracing::info!(next_run = %next, "Daily MMR update scheduled");
        sleep(wait).await;

        match refresh_everyone(&ctx, &data, None).await {
            Ok(Some((summary, changes))) => {
                data.audit
                    .send(
                        &ctx.http,
                        format!(
                            "Daily MMR update: {} updated, {} failed, {} Riot ID changes",
                            summary.updated,
                            summary.failed,
                            changes.len()
                        ),
                    )
                    .await;
            }
            Ok(None) => tracing::info!("Daily MMR update skipped, a refresh is already running"),
            Err(e) => tracing::error!("Daily MMR update failed: {e:#}"),
        }
    }
}

async fn hourly_mmr_board(ctx: serenity::Context, data: Data) {
    loop {
        if let Err(e) = refresh_mmr_board(&ctx, &data, true).await {
            tracing::warn!("Hourly MMR board refresh failed: {e:#}");
        }
        sleep(HOURLY).await;
    }
}

async fn coin_board_loop(ctx: serenity::Context, data: Data) {
    loop {
        if let Err(e) = refresh_coin_board(&ctx, &data, false).await {
            tracing::warn!("Coin board refresh failed: {e:#}");
        }
        sleep(COIN_BOARD_INTERVAL).await;
    }
}

async fn custom_game_reminders(ctx: serenity::Context, data: Data) {
    loop {
        sleep(REMINDER_INTERVAL).await;
        if let Some(batch) = data.custom_game.poll_reminders(Utc::now()).await {
            send_reminders(&ctx, &data, batch).await;
        }
    }
}

/// Temp channel sweep and stats channel renames.
async fn hourly_voice_upkeep(ctx: serenity::Context, data: Data) {
    loop {
        sweep_temp_channels(&ctx, &data).await;
        update_stats_channels(&ctx).await;
        sleep(HOURLY).await;
    }
}

async fn shop_expiry_loop(ctx: serenity::Context, data: Data) {
    loop {
        sleep(SHOP_EXPIRY_INTERVAL).await;
        expire_shop_roles(&ctx, &data).await;
    }
}
