// Discord commands for the coin economy
//
// Following the same pattern as the other command files:
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response

use super::{format_number, reply_ephemeral, Context, Error};
use crate::core::economy::{BalanceAction, DailyClaimOutcome};
use crate::core::timezones::format_hours_minutes;
use crate::discord::boards::refresh_coin_board;
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum BalanceActionChoice {
    #[name = "Add"]
    Add,
    #[name = "Remove"]
    Remove,
    #[name = "Set"]
    Set,
}

impl From<BalanceActionChoice> for BalanceAction {
    fn from(choice: BalanceActionChoice) -> Self {
        match choice {
            BalanceActionChoice::Add => BalanceAction::Add,
            BalanceActionChoice::Remove => BalanceAction::Remove,
            BalanceActionChoice::Set => BalanceAction::Set,
        }
    }
}

async fn refresh_board(ctx: Context<'_>) {
    if let Err(e) = refresh_coin_board(ctx.serenity_context(), ctx.data(), false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
}

/// Check your coin balance
#[poise::command(slash_command, guild_only)]
pub async fn balance(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    if target.bot {
        ctx.say("Bots don't have wallets! 🤖").await?;
        return Ok(());
    }

    let balance = ctx.data().economy.balance(target.id.get()).await?;

    let embed = serenity::CreateEmbed::new()
        .title(format!("💰 {}'s Wallet", target.name))
        .color(0xFFD700)
        .thumbnail(target.face())
        .field("Balance", format!("🪙 **{}**", format_number(balance)), true)
        .footer(serenity::CreateEmbedFooter::new(
            "Use /daily to claim your daily coins!",
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Claim your daily coins
#[poise::command(slash_command, guild_only)]
pub async fn daily(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    match ctx
        .data()
        .economy
        .claim_daily(user_id, chrono::Utc::now())
        .await?
    {
        DailyClaimOutcome::Claimed {
            awarded,
            new_balance,
        } => {
            let embed = serenity::CreateEmbed::new()
                .title("✅ Daily Coins Claimed!")
                .description(format!("You received **{awarded} coins**!"))
                .color(0x00FF00)
                .field("New Balance", format!("🪙 {}", format_number(new_balance)), true)
                .footer(serenity::CreateEmbedFooter::new("Come back tomorrow for more!"));
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
            ctx.data()
                .audit
                .send(ctx.http(), format!("<@{user_id}> claimed {awarded} daily coins"))
                .await;
            refresh_board(ctx).await;
        }
        DailyClaimOutcome::AlreadyClaimed { retry_in } => {
            let embed = serenity::CreateEmbed::new()
                .title("⏰ Daily Coins Already Claimed")
                .description("You've already claimed your coins today!")
                .color(0xFFA500)
                .field("Next Claim", format_hours_minutes(retry_in), false);
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
        }
    }

    Ok(())
}

/// Adjust the balance of up to five members (admin)
#[poise::command(
    slash_command,
    guild_only,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn coins(
    ctx: Context<'_>,
    #[description = "What to do"] action: BalanceActionChoice,
    #[description = "Amount of coins"]
    #[min = 0]
    amount: i64,
    #[description = "Member"] user1: serenity::User,
    #[description = "Member"] user2: Option<serenity::User>,
    #[description = "Member"] user3: Option<serenity::User>,
    #[description = "Member"] user4: Option<serenity::User>,
    #[description = "Member"] user5: Option<serenity::User>,
) -> Result<(), Error> {
    let targets: Vec<serenity::User> = std::iter::once(user1)
        .chain([user2, user3, user4, user5].into_iter().flatten())
        .filter(|u| !u.bot)
        .collect();

    let mut lines = Vec::with_capacity(targets.len());
    for target in &targets {
        let change = ctx
            .data()
            .economy
            .modify(target.id.get(), action.into(), amount)
            .await?;
        lines.push(format!(
            "<@{}>: {} → {}",
            target.id,
            format_number(change.old_balance),
            format_number(change.new_balance)
        ));
    }

    if lines.is_empty() {
        return reply_ephemeral(ctx, "No members to update.").await;
    }

    let summary = lines.join("\n");
    ctx.data()
        .audit
        .send(
            ctx.http(),
            format!(
                "<@{}> used coins {} {amount}:\n{summary}",
                ctx.author().id,
                action.name()
            ),
        )
        .await;

    let embed = serenity::CreateEmbed::new()
        .title("🪙 Balances updated")
        .description(summary)
        .color(0x3498DB);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    refresh_board(ctx).await;
    Ok(())
}

/// Send coins to another member (10% fee)
#[poise::command(slash_command, guild_only)]
pub async fn tip(
    ctx: Context<'_>,
    #[description = "Who gets the coins"] user: serenity::User,
    #[description = "How many coins to send"] amount: i64,
) -> Result<(), Error> {
    if user.bot {
        return reply_ephemeral(ctx, "Bots don't need coins! 🤖").await;
    }

    let sender = ctx.author().id.get();
    let receipt = ctx
        .data()
        .economy
        .transfer(sender, user.id.get(), amount)
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("💸 Coins sent")
        .description(format!(
            "<@{sender}> sent **{}** coins to <@{}>",
            format_number(receipt.amount),
            user.id
        ))
        .color(0x2ECC71)
        .field("Fee", format_number(receipt.fee), true)
        .field("Received", format_number(receipt.received), true)
        .field("Your balance", format_number(receipt.sender_balance), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    ctx.data()
        .audit
        .send(
            ctx.http(),
            format!(
                "<@{sender}> tipped <@{}> {} coins (fee {})",
                user.id, receipt.amount, receipt.fee
            ),
        )
        .await;
    refresh_board(ctx).await;
    Ok(())
}

fn leaderboard_embed(
    page: &crate::core::economy::CoinLeaderboardPage,
    viewer: u64,
) -> serenity::CreateEmbed {
    let offset = (page.page - 1) * page.per_page;
    let description = if page.entries.is_empty() {
        "Nobody has any coins yet.".to_string()
    } else {
        page.entries
            .iter()
            .enumerate()
            .map(|(i, (user_id, balance))| {
                let rank = offset as usize + i + 1;
                let me = if *user_id == viewer { " (You)" } else { "" };
                format!("**#{rank}** <@{user_id}>{me} · 🪙 {}", format_number(*balance))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    serenity::CreateEmbed::new()
        .title("💰 Coin Leaderboard")
        .description(description)
        .color(0xFFD700)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Page {}/{}",
            page.page, page.total_pages
        )))
}

fn pager_buttons(page: u32, total_pages: u32) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("prev")
            .label("◀ Previous")
            .style(serenity::ButtonStyle::Primary)
            .disabled(page <= 1),
        serenity::CreateButton::new("next")
            .label("Next ▶")
            .style(serenity::ButtonStyle::Primary)
            .disabled(page >= total_pages),
    ])]
}

/// Show the richest members
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let viewer = ctx.author().id.get();
    let mut page = ctx.data().economy.leaderboard_page(1).await?;

    let msg = ctx
        .send(
            poise::CreateReply::default()
                .embed(leaderboard_embed(&page, viewer))
                .components(pager_buttons(page.page, page.total_pages)),
        )
        .await?;
    let msg_id = msg.message().await?.id;

    while let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .timeout(std::time::Duration::from_secs(60 * 2))
        .filter(move |mci| mci.message.id == msg_id)
        .await
    {
        let wanted = match mci.data.custom_id.as_str() {
            "prev" => page.page.saturating_sub(1).max(1),
            "next" => page.page + 1,
            _ => continue,
        };

        if let Err(e) = mci.defer(ctx.http()).await {
            tracing::warn!("Error deferring interaction: {e}");
            continue;
        }

        page = ctx.data().economy.leaderboard_page(wanted).await?;
        msg.edit(
            ctx,
            poise::CreateReply::default()
                .embed(leaderboard_embed(&page, viewer))
                .components(pager_buttons(page.page, page.total_pages)),
        )
        .await?;
    }

    // Remove components after timeout
    let _ = msg
        .edit(ctx, poise::CreateReply::default().components(vec![]))
        .await;

    Ok(())
}
