// Crash game: the first join opens a lobby, a spawned task then runs the
// round, editing one message per tick until the multiplier crashes.

use super::{ensure_channel, format_number, signed, Context, Data, Error};
use crate::core::crash::{CrashGameError, RoundSnapshot, RoundSummary, LOBBY_SECONDS, TICK_SECONDS};
use crate::discord::boards::refresh_coin_board;
use poise::serenity_prelude as serenity;
use std::time::Duration;

pub const CASHOUT_PREFIX: &str = "crash:cashout:";
const HISTORY_SHOWN: usize = 12;

/// Join the next crash round
#[poise::command(slash_command, guild_only)]
pub async fn crash(
    ctx: Context<'_>,
    #[description = "Coins to bet"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.crash).await? {
        return Ok(());
    }

    let receipt = ctx
        .data()
        .crash
        .join(ctx.author().id.get(), bet, ctx.id())
        .await?;

    if receipt.opened_lobby {
        ctx.say(format!(
            "🚀 <@{}> opened a crash round with **{}** coins! Join with `/crash` in the next {LOBBY_SECONDS} seconds.",
            ctx.author().id,
            format_number(bet)
        ))
        .await?;

        let sctx = ctx.serenity_context().clone();
        let data = ctx.data().clone();
        let channel_id = ctx.channel_id();
        tokio::spawn(async move {
            let round = tokio::spawn({
                let sctx = sctx.clone();
                let data = data.clone();
                async move { run_round(&sctx, &data, channel_id).await }
            });
            // A panicking round must not hold the slot.
            if let Err(e) = round.await {
                tracing::error!("Crash round task failed: {e}");
                data.crash.abort().await;
                data.audit
                    .send(&sctx.http, format!("Crash round aborted: {e}"))
                    .await;
            }
        });
    } else {
        ctx.say(format!(
            "✅ <@{}> joined the crash round with **{}** coins ({} players).",
            ctx.author().id,
            format_number(bet),
            receipt.players
        ))
        .await?;
    }
    Ok(())
}

fn history_line(history: &[f64]) -> String {
    let skip = history.len().saturating_sub(HISTORY_SHOWN);
    history[skip..]
        .iter()
        .map(|m| format!("{m:.2}x"))
        .collect::<Vec<_>>()
        .join(" → ")
}

fn round_embed(snapshot: &RoundSnapshot) -> serenity::CreateEmbed {
    let players = snapshot
        .players
        .iter()
        .map(|(user, bet, cashed)| match cashed {
            Some(at) => format!("<@{user}> · {} · cashed at **{at:.2}x**", format_number(*bet)),
            None => format!("<@{user}> · {}", format_number(*bet)),
        })
        .collect::<Vec<_>>()
        .join("\n");

    serenity::CreateEmbed::new()
        .title(format!("🚀 {:.2}x", snapshot.multiplier))
        .description(history_line(&snapshot.history))
        .field("Players", players, false)
        .color(0x3498DB)
}

fn summary_embed(summary: &RoundSummary) -> serenity::CreateEmbed {
    let results = summary
        .results
        .iter()
        .map(|r| match r.cashed_at {
            Some(at) => format!("<@{}> cashed at {at:.2}x · {}", r.user_id, signed(r.net)),
            None => format!("<@{}> crashed · {}", r.user_id, signed(r.net)),
        })
        .collect::<Vec<_>>()
        .join("\n");

    serenity::CreateEmbed::new()
        .title(format!("💥 Crashed at {:.2}x", summary.crash_point))
        .description(history_line(&summary.history))
        .field("Results", results, false)
        .color(0xE74C3C)
}

fn cashout_button(round_id: u64) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(format!("{CASHOUT_PREFIX}{round_id}"))
            .label("Cash out")
            .style(serenity::ButtonStyle::Success),
    ])]
}

/// Drives a round from lobby to settlement. Send and edit failures are
/// logged and the round keeps going, so the service always reaches `finish`.
async fn run_round(ctx: &serenity::Context, data: &Data, channel_id: serenity::ChannelId) {
    tokio::time::sleep(Duration::from_secs(LOBBY_SECONDS)).await;

    let Some(snapshot) = data.crash.start().await else {
        return;
    };
    let round_id = snapshot.round_id;
    let mut message = match channel_id
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .embed(round_embed(&snapshot))
                .components(cashout_button(round_id)),
        )
        .await
    {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::error!(round_id, "Crash round message failed: {e}");
            None
        }
    };

    loop {
        tokio::time::sleep(Duration::from_secs(TICK_SECONDS)).await;
        let Some((snapshot, crashed)) = data.crash.tick().await else {
            break;
        };
        if crashed {
            break;
        }
        if let Some(message) = message.as_mut() {
            if let Err(e) = message
                .edit(ctx, serenity::EditMessage::new().embed(round_embed(&snapshot)))
                .await
            {
                tracing::warn!(round_id, "Crash tick edit failed: {e}");
            }
        }
    }

    let Some(summary) = data.crash.finish().await else {
        return;
    };
    tracing::info!(round_id, crash_point = summary.crash_point, "Crash round settled");

    if !summary.unsettled.is_empty() {
        data.audit
            .send(
                &ctx.http,
                format!(
                    "Crash round {round_id}: could not settle {}",
                    summary
                        .unsettled
                        .iter()
                        .map(|u| format!("<@{u}>"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
            .await;
    }

    let edit = serenity::EditMessage::new()
        .embed(summary_embed(&summary))
        .components(vec![]);
    let shown = match message.as_mut() {
        Some(message) => message.edit(ctx, edit).await.map_err(|e| e.to_string()),
        None => channel_id
            .send_message(ctx, serenity::CreateMessage::new().embed(summary_embed(&summary)))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
    };
    if let Err(e) = shown {
        tracing::warn!(round_id, "Crash summary message failed: {e}");
    }

    if let Err(e) = refresh_coin_board(ctx, data, false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
}

/// The cash-out button on a running round.
pub async fn handle_cashout(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let text = match data.crash.cash_out(interaction.user.id.get()).await {
        Ok(multiplier) => format!("💰 Cashed out at **{multiplier:.2}x**!"),
        Err(CrashGameError::Round(e)) => format!("❌ {e}"),
        Err(e) => return Err(e.into()),
    };

    interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
