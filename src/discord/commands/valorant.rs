// Valorant commands: account linking, rank cards, recent matches and the
// MMR maintenance tools.

use super::{reply_ephemeral, Context, Data, Error};
use crate::core::valorant::{MatchLine, RefreshProgress, RefreshSummary, RiotIdChange};
use crate::discord::boards::refresh_mmr_board;
use poise::serenity_prelude as serenity;
use std::time::Duration;

/// Pause between players during a full refresh, to stay under the API quota.
pub const REFRESH_THROTTLE: Duration = Duration::from_secs(10);

fn match_line(line: &MatchLine) -> String {
    let result = if line.won { "🟢 W" } else { "🔴 L" };
    format!(
        "{result} **{}** · {} · {} · KDA `{}` · HS {:.1}% · ADR {} · [tracker]({})",
        line.map,
        line.agent,
        line.started,
        line.kda(),
        line.hs_pct,
        line.adr,
        line.tracker_url()
    )
}

fn match_list(lines: &[MatchLine]) -> String {
    if lines.is_empty() {
        "No recent matches.".to_string()
    } else {
        lines.iter().map(match_line).collect::<Vec<_>>().join("\n")
    }
}

/// Link your Riot account (Name#TAG)
#[poise::command(slash_command, guild_only)]
pub async fn link(
    ctx: Context<'_>,
    #[description = "Your Riot ID, e.g. Sova#EUW"] riot_id: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let discord_id = ctx.author().id.get();
    let account = ctx.data().valorant.link(discord_id, &riot_id).await?;

    if let Some(member) = ctx.author_member().await {
        ctx.data()
            .valorant
            .update_nick(discord_id, member.display_name())
            .await?;
    }

    ctx.say(format!(
        "✅ Linked <@{discord_id}> to **{}#{}**.",
        account.name, account.tag
    ))
    .await?;
    ctx.data()
        .audit
        .send(
            ctx.http(),
            format!("<@{discord_id}> linked {}#{}", account.name, account.tag),
        )
        .await;
    Ok(())
}

/// Show the current rank and latest matches
#[poise::command(slash_command, guild_only)]
pub async fn rank(
    ctx: Context<'_>,
    #[description = "Member to look up (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let report = ctx.data().valorant.rank(target.id.get()).await?;

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🎯 {}", report.player.riot_id()))
        .description(format!("**{}** · {} RR", report.tier, report.rr))
        .field("Recent matches", match_list(&report.recent), false)
        .color(0xFD4556);
    if let Some(image) = report.image {
        embed = embed.thumbnail(image);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show your latest matches
#[poise::command(slash_command, guild_only)]
pub async fn recent(
    ctx: Context<'_>,
    #[description = "Only custom games"] custom: Option<bool>,
    #[description = "Member to look up (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let custom_only = custom.unwrap_or(false);
    let (player, lines) = ctx
        .data()
        .valorant
        .recent_matches(target.id.get(), custom_only)
        .await?;

    let kind = if custom_only { "custom" } else { "recent" };
    let embed = serenity::CreateEmbed::new()
        .title(format!("📜 {} · {kind} matches", player.riot_id()))
        .description(match_list(&lines))
        .color(0xFD4556);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// MMR tools
#[poise::command(
    slash_command,
    guild_only,
    subcommands("show", "updateall", "leaderboard", "seed")
)]
pub async fn mmr(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(
        "MMR commands:\n\
        `/mmr show` - Your rating breakdown\n\
        `/mmr updateall` - Recompute every linked player (admins only)\n\
        `/mmr leaderboard` - Repost the MMR leaderboard (admins only)\n\
        `/mmr seed` - Import players from the roster sheet (admins only)",
    )
    .await?;
    Ok(())
}

/// Show the rating breakdown of a member
#[poise::command(slash_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Member to look up (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let player = ctx.data().valorant.mmr_details(target.id.get()).await?;

    let embed = serenity::CreateEmbed::new()
        .title(format!("📈 {}", player.riot_id()))
        .field("Visible MMR", format!("**{}**", player.visible_mmr), false)
        .field("Competitive", player.competitive_mmr.to_string(), true)
        .field("Hidden (wins)", player.hidden.win_mmr.to_string(), true)
        .field("Hidden (impact)", player.hidden.encounter_mmr.to_string(), true)
        .field("Deviation", format!("{:.1}", player.hidden.rd), true)
        .field("Volatility", format!("{:.3}", player.hidden.volatility), true)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Last active {}",
            player.last_active.format("%Y-%m-%d %H:%M UTC")
        )))
        .color(0xFD4556);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn progress_text(p: &RefreshProgress) -> String {
    let mark = if p.succeeded { "✅" } else { "⚠️" };
    format!("🔄 Updating MMR {}/{} · {mark} {}", p.done, p.total, p.riot_id)
}

/// Rename changed Riot IDs, recompute every player and refresh the board.
/// Returns None when another refresh is already running. Progress lines are
/// written into `progress` when given.
pub async fn refresh_everyone(
    ctx: &serenity::Context,
    data: &Data,
    progress: Option<serenity::Message>,
) -> anyhow::Result<Option<(RefreshSummary, Vec<RiotIdChange>)>> {
    let Ok(_running) = data.mmr_refresh.try_lock() else {
        return Ok(None);
    };

    let changes = data.valorant.detect_riot_id_changes().await?;
    for change in &changes {
        data.audit
            .send(
                &ctx.http,
                format!("Riot ID changed: {} → {}", change.old_riot_id, change.new_riot_id),
            )
            .await;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<RefreshProgress>();
    let editor = progress.map(|mut message| {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                let edit = serenity::EditMessage::new().content(progress_text(&p));
                if let Err(e) = message.edit(&ctx, edit).await {
                    tracing::debug!("Progress edit failed: {e}");
                }
            }
        })
    });

    let summary = data
        .valorant
        .refresh_all(REFRESH_THROTTLE, move |p| {
            let _ = tx.send(p);
        })
        .await;
    if let Some(editor) = editor {
        let _ = editor.await;
    }
    let summary = summary?;

    tracing::info!(updated = summary.updated, failed = summary.failed, "MMR refresh complete");
    if let Err(e) = refresh_mmr_board(ctx, data, true).await {
        tracing::warn!("MMR board refresh failed: {e:#}");
    }
    Ok(Some((summary, changes)))
}

/// Recompute MMR for every linked player
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn updateall(ctx: Context<'_>) -> Result<(), Error> {
    let handle = ctx.say("🔄 Starting MMR update...").await?;
    let message = handle.into_message().await?;

    match refresh_everyone(ctx.serenity_context(), ctx.data(), Some(message)).await? {
        Some((summary, changes)) => {
            ctx.say(format!(
                "✅ MMR updated for {} players ({} failed, {} Riot ID changes).",
                summary.updated,
                summary.failed,
                changes.len()
            ))
            .await?;
            ctx.data()
                .audit
                .send(
                    ctx.http(),
                    format!(
                        "<@{}> ran a full MMR update: {} updated, {} failed",
                        ctx.author().id,
                        summary.updated,
                        summary.failed
                    ),
                )
                .await;
        }
        None => {
            reply_ephemeral(ctx, "An MMR update is already running.").await?;
        }
    }
    Ok(())
}

/// Repost the MMR leaderboard
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    refresh_mmr_board(ctx.serenity_context(), ctx.data(), true).await?;
    reply_ephemeral(ctx, "✅ MMR leaderboard refreshed.").await
}

/// Import players from the roster spreadsheet
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn seed(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let (Some(sheets), Some(sheet_id)) = (data.sheets.as_ref(), data.config.player_sheet_id.as_deref())
    else {
        return reply_ephemeral(
            ctx,
            "Set PLAYER_SHEET_ID and a Google service account to import players.",
        )
        .await;
    };

    ctx.defer().await?;
    let rows = sheets
        .read_range(sheet_id, &data.config.player_sheet_range)
        .await?;
    let report = data.valorant.seed_from_sheet(&rows).await?;

    ctx.say(format!(
        "✅ Imported {} players ({} rows skipped).",
        report.seeded, report.skipped
    ))
    .await?;
    data.audit
        .send(
            ctx.http(),
            format!(
                "<@{}> seeded {} players from the roster sheet",
                ctx.author().id,
                report.seeded
            ),
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(won: bool) -> MatchLine {
        MatchLine {
            match_id: "abc-123".into(),
            map: "Ascent".into(),
            agent: "Sova".into(),
            mode: "Competitive".into(),
            won,
            kills: 21,
            deaths: 14,
            assists: 6,
            score: 5400,
            hs_pct: 27.456,
            adr: 162,
            tier: "Gold 2".into(),
            rounds: 24,
            started: "Mar 3, 9:14 PM".into(),
        }
    }

    #[test]
    fn match_lines_show_result_and_stats() {
        let text = match_line(&line(true));
        assert!(text.starts_with("🟢 W **Ascent** · Sova"));
        assert!(text.contains("KDA `21/14/6`"));
        assert!(text.contains("HS 27.5%"));
        assert!(text.contains("https://tracker.gg/valorant/match/abc-123"));
        assert!(match_line(&line(false)).starts_with("🔴 L"));
    }

    #[test]
    fn empty_match_list_says_so() {
        assert_eq!(match_list(&[]), "No recent matches.");
    }

    #[test]
    fn progress_marks_failures() {
        let p = RefreshProgress {
            done: 3,
            total: 9,
            riot_id: "Sova#EUW".into(),
            succeeded: false,
        };
        assert_eq!(progress_text(&p), "🔄 Updating MMR 3/9 · ⚠️ Sova#EUW");
    }
}
