// Discord commands for the leveling system.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use super::{reply_ephemeral, Context, Error};
use crate::core::leveling::{DailyBonusOutcome, XpAction};
use crate::core::timezones::{format_hours_minutes, time_until_reset};
use crate::discord::boards::refresh_xp_board;
use crate::discord::leveling::{announce_level_up, build_progress_bar, is_booster};
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum XpActionChoice {
    #[name = "Add"]
    Add,
    #[name = "Remove"]
    Remove,
    #[name = "Set"]
    Set,
}

impl From<XpActionChoice> for XpAction {
    fn from(choice: XpActionChoice) -> Self {
        match choice {
            XpActionChoice::Add => XpAction::Add,
            XpActionChoice::Remove => XpAction::Remove,
            XpActionChoice::Set => XpAction::Set,
        }
    }
}

async fn refresh_board(ctx: Context<'_>) {
    if let Err(e) = refresh_xp_board(ctx.serenity_context(), ctx.data(), false).await {
        tracing::warn!("XP board refresh failed: {e:#}");
    }
}

/// Show your level, XP and rank.
#[poise::command(slash_command, guild_only)]
pub async fn xp(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    if target.bot {
        ctx.say("Bots don't have profiles! 🤖").await?;
        return Ok(());
    }

    let leveling = &ctx.data().leveling;
    let progress = leveling.progress(target.id.get()).await?;
    let rank = leveling.rank(target.id.get()).await?;
    let needed = progress.needed();

    let embed = serenity::CreateEmbed::new()
        .title(format!("Profile of {}", target.name))
        .color(0x00ff00)
        .thumbnail(target.face())
        .field("Level", format!("**{}**", progress.level), true)
        .field(
            "Rank",
            rank.map(|r| format!("#{r}"))
                .unwrap_or_else(|| "Unranked".to_string()),
            true,
        )
        .field(
            "Progress",
            format!(
                "{}/{} XP\n{}",
                progress.xp,
                needed,
                build_progress_bar(progress.xp as f64 / needed as f64, 15)
            ),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Adjust a member's XP (admin).
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn xpmodify(
    ctx: Context<'_>,
    #[description = "What to do"] action: XpActionChoice,
    #[description = "Member"] user: serenity::User,
    #[description = "Amount of XP"]
    #[min = 0]
    amount: i64,
) -> Result<(), Error> {
    if user.bot {
        return reply_ephemeral(ctx, "You can't give XP to bots!").await;
    }

    let change = ctx
        .data()
        .leveling
        .modify(user.id.get(), action.into(), amount)
        .await?;

    ctx.say(format!(
        "✅ <@{}>: {} → {} XP (level {})",
        user.id, change.old_xp, change.new_xp, change.level
    ))
    .await?;
    ctx.data()
        .audit
        .send(
            ctx.http(),
            format!(
                "<@{}> used xp {} {amount} on <@{}>",
                ctx.author().id,
                action.name(),
                user.id
            ),
        )
        .await;
    refresh_board(ctx).await;
    Ok(())
}

/// Claim your daily XP bonus.
#[poise::command(slash_command, guild_only)]
pub async fn dailyxp(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let boosted = ctx
        .author_member()
        .await
        .is_some_and(|m| is_booster(ctx.data(), &m.roles));
    let now = chrono::Utc::now();

    match ctx
        .data()
        .leveling
        .claim_daily_bonus(user_id, boosted, now)
        .await?
    {
        DailyBonusOutcome::Granted { amount, level_up } => {
            ctx.say(format!("✅ You received **{amount} XP**!")).await?;
            if let Some(level_up) = level_up {
                announce_level_up(ctx.serenity_context(), ctx.data(), &level_up).await;
            }
            refresh_board(ctx).await;
        }
        DailyBonusOutcome::AlreadyClaimed => {
            reply_ephemeral(
                ctx,
                format!(
                    "⏰ You already claimed today's XP. Next claim in {}.",
                    format_hours_minutes(time_until_reset(now))
                ),
            )
            .await?;
        }
    }
    Ok(())
}

/// Show the top 10 by level.
#[poise::command(slash_command, guild_only)]
pub async fn xpleaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let top = ctx.data().leveling.leaderboard(10).await?;
    let me = ctx.author().id.get();

    let mut description = String::new();
    for (i, p) in top.iter().enumerate() {
        let medal = match i + 1 {
            1 => "🥇",
            2 => "🥈",
            3 => "🥉",
            _ => "  ",
        };
        let you = if p.user_id == me { " (You)" } else { "" };
        description.push_str(&format!(
            "{medal} **#{}** <@{}>{you}\nLevel {} | {}/{} XP\n",
            i + 1,
            p.user_id,
            p.level,
            p.xp,
            p.needed()
        ));
    }
    if description.is_empty() {
        description.push_str("No XP earned yet.");
    }

    let embed = serenity::CreateEmbed::new()
        .title("📊 Leaderboard")
        .description(description)
        .color(0xffd700);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_map_to_xp_actions() {
        assert_eq!(XpAction::from(XpActionChoice::Add), XpAction::Add);
        assert_eq!(XpAction::from(XpActionChoice::Remove), XpAction::Remove);
        assert_eq!(XpAction::from(XpActionChoice::Set), XpAction::Set);
    }
}
