// Team predictions: an admin posts two teams, members press a team button and
// enter their stake in a modal, and the admin later closes or cancels it.

use super::{ephemeral, format_number, input_value, reply_ephemeral, Context, Data, Error};
use crate::core::betting::{BettingError, Prediction, PredictionOutcome, Side};
use crate::core::economy::EconomyError;
use crate::discord::boards::refresh_coin_board;
use poise::serenity_prelude as serenity;

pub const BET_PREFIX: &str = "bet:";
const FIRST_BUTTON: &str = "bet:first";
const SECOND_BUTTON: &str = "bet:second";
/// Followed by `first|second:<prediction message id>`.
const AMOUNT_MODAL_PREFIX: &str = "bet:amount:";
const AMOUNT_INPUT: &str = "amount";

/// Backers listed per team before the list is cut short.
const BACKERS_SHOWN: usize = 15;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum WinnerChoice {
    #[name = "Team 1"]
    First,
    #[name = "Team 2"]
    Second,
}

impl From<WinnerChoice> for Side {
    fn from(choice: WinnerChoice) -> Self {
        match choice {
            WinnerChoice::First => Side::First,
            WinnerChoice::Second => Side::Second,
        }
    }
}

fn side_key(side: Side) -> &'static str {
    match side {
        Side::First => "first",
        Side::Second => "second",
    }
}

fn parse_side(key: &str) -> Option<Side> {
    match key {
        "first" => Some(Side::First),
        "second" => Some(Side::Second),
        _ => None,
    }
}

fn amount_modal_id(side: Side, message_id: u64) -> String {
    format!("{AMOUNT_MODAL_PREFIX}{}:{message_id}", side_key(side))
}

/// Side and prediction message out of an amount modal id.
fn parse_amount_modal(custom_id: &str) -> Option<(Side, u64)> {
    let rest = custom_id.strip_prefix(AMOUNT_MODAL_PREFIX)?;
    let (side, message_id) = rest.split_once(':')?;
    Some((parse_side(side)?, message_id.parse().ok()?))
}

fn odds_label(odds: Option<f64>) -> String {
    match odds {
        Some(odds) => format!("1:{odds:.2}"),
        None => "-".to_string(),
    }
}

fn backers(prediction: &Prediction, side: Side) -> String {
    let stakes = prediction.stakes(side);
    if stakes.is_empty() {
        return "-".to_string();
    }
    let mut lines: Vec<String> = stakes
        .iter()
        .take(BACKERS_SHOWN)
        .map(|(user, amount)| format!("<@{user}>: {} coins", format_number(*amount)))
        .collect();
    if stakes.len() > BACKERS_SHOWN {
        lines.push(format!("+{} more", stakes.len() - BACKERS_SHOWN));
    }
    lines.join("\n")
}

fn prediction_embed(prediction: &Prediction) -> serenity::CreateEmbed {
    let (first, second) = (Side::First, Side::Second);
    let mut embed = serenity::CreateEmbed::new()
        .title("🏆 Betting open")
        .description(format!(
            "{} vs {}\nShare: {:.1}% | {:.1}%  •  Odds: {} | {}",
            prediction.team(first),
            prediction.team(second),
            prediction.share_percent(first),
            prediction.share_percent(second),
            odds_label(prediction.odds(first)),
            odds_label(prediction.odds(second)),
        ))
        .footer(serenity::CreateEmbedFooter::new("Press a team to place a bet."))
        .color(0x5865F2);
    for side in Side::BOTH {
        embed = embed.field(
            format!(
                "{} ({} coins, odds {})",
                prediction.team(side),
                format_number(prediction.pool(side)),
                odds_label(prediction.odds(side))
            ),
            backers(prediction, side),
            false,
        );
    }
    embed
}

fn prediction_buttons(prediction: &Prediction) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(FIRST_BUTTON)
            .label(prediction.team(Side::First))
            .style(serenity::ButtonStyle::Primary),
        serenity::CreateButton::new(SECOND_BUTTON)
            .label(prediction.team(Side::Second))
            .style(serenity::ButtonStyle::Primary),
    ])]
}

/// Replace the prediction message with its final state.
async fn close_prediction_message(
    ctx: &serenity::Context,
    prediction: &Prediction,
    embed: serenity::CreateEmbed,
) {
    let Some(message_id) = prediction.message_id else {
        return;
    };
    let edit = serenity::EditMessage::new().embed(embed).components(vec![]);
    if let Err(e) = serenity::ChannelId::new(prediction.channel_id)
        .edit_message(ctx, serenity::MessageId::new(message_id), edit)
        .await
    {
        tracing::warn!("Failed to close the prediction message: {e}");
    }
}

async fn notify(ctx: &serenity::Context, user_id: u64, text: String) {
    let dm = serenity::CreateMessage::new().content(text);
    if let Err(e) = serenity::UserId::new(user_id).direct_message(ctx, dm).await {
        tracing::debug!("Could not DM {user_id}: {e}");
    }
}

async fn report_unsettled(ctx: &serenity::Context, data: &Data, outcome: &PredictionOutcome) {
    if outcome.unsettled.is_empty() {
        return;
    }
    let users = outcome
        .unsettled
        .iter()
        .map(|u| format!("<@{u}>"))
        .collect::<Vec<_>>()
        .join(" ");
    data.audit
        .send(
            &ctx.http,
            format!(
                "⚠️ Prediction {} vs {} could not credit: {users}",
                outcome.prediction.team(Side::First),
                outcome.prediction.team(Side::Second)
            ),
        )
        .await;
}

/// Open a two-team prediction in this channel
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn createbet(
    ctx: Context<'_>,
    #[description = "Team 1 name"] team1: String,
    #[description = "Team 2 name"] team2: String,
) -> Result<(), Error> {
    let data = ctx.data();
    let prediction = match data
        .betting
        .open(ctx.id(), ctx.channel_id().get(), &team1, &team2)
        .await
    {
        Ok(p) => p,
        Err(e @ (BettingError::AlreadyOpen | BettingError::Prediction(_))) => {
            return reply_ephemeral(ctx, format!("❌ {e}")).await;
        }
        Err(e) => return Err(e.into()),
    };

    let message = serenity::CreateMessage::new()
        .embed(prediction_embed(&prediction))
        .components(prediction_buttons(&prediction));
    let posted = match ctx.channel_id().send_message(ctx, message).await {
        Ok(m) => m,
        Err(e) => {
            // Nobody can bet without the message, so drop the empty prediction.
            data.betting.cancel().await?;
            return Err(e.into());
        }
    };
    data.betting.set_message(posted.id.get()).await?;

    data.audit
        .send(
            ctx.http(),
            format!("<@{}> opened betting: {team1} vs {team2}", ctx.author().id),
        )
        .await;
    reply_ephemeral(ctx, "✅ Betting is open.").await
}

/// Cancel the open prediction and refund every bet
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn cancelbet(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let outcome = match data.betting.cancel().await {
        Ok(o) => o,
        Err(BettingError::NoActivePrediction) => {
            return reply_ephemeral(ctx, "❌ There is no open prediction.").await;
        }
        Err(e) => return Err(e.into()),
    };
    let sctx = ctx.serenity_context();

    close_prediction_message(
        sctx,
        &outcome.prediction,
        serenity::CreateEmbed::new()
            .title("❌ Betting cancelled")
            .description("An admin cancelled this prediction and every bet was refunded.")
            .color(0xE74C3C),
    )
    .await;

    for &(user, amount) in &outcome.credited {
        notify(
            sctx,
            user,
            format!("❌ Betting was cancelled, {} coins were refunded.", format_number(amount)),
        )
        .await;
    }
    report_unsettled(sctx, data, &outcome).await;
    if let Err(e) = refresh_coin_board(sctx, data, false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
    reply_ephemeral(ctx, "✅ Betting cancelled and refunded.").await
}

/// Close the open prediction and pay the winning side
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn closebet(
    ctx: Context<'_>,
    #[description = "Winning team"] winner: WinnerChoice,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let data = ctx.data();
    let winner = Side::from(winner);
    let outcome = match data.betting.close(winner).await {
        Ok(o) => o,
        Err(e @ (BettingError::NoActivePrediction | BettingError::Prediction(_))) => {
            return reply_ephemeral(ctx, format!("❌ {e}")).await;
        }
        Err(e) => return Err(e.into()),
    };
    let sctx = ctx.serenity_context();
    let prediction = &outcome.prediction;
    let team = prediction.team(winner);

    close_prediction_message(
        sctx,
        prediction,
        serenity::CreateEmbed::new()
            .title("🏁 Betting closed")
            .description(format!("Winner: **{team}**"))
            .field(
                "Total pool",
                format!("{} coins", format_number(prediction.total())),
                false,
            )
            .field("Odds", format!("{:.2}x", outcome.odds.unwrap_or(0.0)), false)
            .color(0x2ECC71),
    )
    .await;

    for &(user, payout) in &outcome.credited {
        notify(
            sctx,
            user,
            format!("🏆 You backed `{team}` and won {} coins!", format_number(payout)),
        )
        .await;
    }
    report_unsettled(sctx, data, &outcome).await;
    if let Err(e) = refresh_coin_board(sctx, data, false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
    data.audit
        .send(
            &sctx.http,
            format!(
                "<@{}> closed betting. Winner {team}, pool {}",
                ctx.author().id,
                format_number(prediction.total())
            ),
        )
        .await;
    reply_ephemeral(ctx, "✅ Betting closed and paid out.").await
}

/// Team buttons: open the stake modal for the pressed side.
pub async fn handle_bet_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let side = match interaction.data.custom_id.as_str() {
        FIRST_BUTTON => Side::First,
        SECOND_BUTTON => Side::Second,
        _ => return Ok(()),
    };
    let message_id = interaction.message.id.get();
    let prediction = match data.betting.current().await {
        Some(p) if p.message_id == Some(message_id) => p,
        _ => {
            interaction
                .create_response(ctx, ephemeral("❌ This prediction is no longer open."))
                .await?;
            return Ok(());
        }
    };

    let input = serenity::CreateInputText::new(
        serenity::InputTextStyle::Short,
        "Coins to bet",
        AMOUNT_INPUT,
    )
    .placeholder("e.g. 100");
    let modal = serenity::CreateModal::new(
        amount_modal_id(side, message_id),
        format!("Bet on {}", prediction.team(side)),
    )
    .components(vec![serenity::CreateActionRow::InputText(input)]);

    interaction
        .create_response(ctx, serenity::CreateInteractionResponse::Modal(modal))
        .await?;
    Ok(())
}

/// Stake modal submitted: take the coins and refresh the prediction message.
pub async fn handle_bet_submit(
    ctx: &serenity::Context,
    modal: &serenity::ModalInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let Some((side, message_id)) = parse_amount_modal(&modal.data.custom_id) else {
        return Ok(());
    };
    let Ok(amount) = input_value(&modal.data.components, AMOUNT_INPUT).parse::<i64>() else {
        modal
            .create_response(ctx, ephemeral("❌ Enter a whole number of coins."))
            .await?;
        return Ok(());
    };

    let user_id = modal.user.id.get();
    let receipt = match data
        .betting
        .place(user_id, side, amount, message_id, modal.id.get())
        .await
    {
        Ok(r) => r,
        Err(BettingError::Economy(EconomyError::StoreError(e))) => {
            return Err(anyhow::anyhow!("bet for {user_id} failed: {e}"));
        }
        Err(e) => {
            modal.create_response(ctx, ephemeral(format!("❌ {e}"))).await?;
            return Ok(());
        }
    };

    modal
        .create_response(
            ctx,
            ephemeral(format!(
                "✅ Bet {} coins on **{}** (your total {}, balance {}).",
                format_number(receipt.staked),
                receipt.prediction.team(side),
                format_number(receipt.user_total),
                format_number(receipt.balance)
            )),
        )
        .await?;

    let edit = serenity::EditMessage::new().embed(prediction_embed(&receipt.prediction));
    if let Err(e) = serenity::ChannelId::new(receipt.prediction.channel_id)
        .edit_message(ctx, serenity::MessageId::new(message_id), edit)
        .await
    {
        tracing::warn!("Failed to update the prediction message: {e}");
    }
    data.audit
        .send(
            &ctx.http,
            format!(
                "🎲 <@{user_id}> bet {} coins on {}",
                format_number(receipt.staked),
                receipt.prediction.team(side)
            ),
        )
        .await;
    if let Err(e) = refresh_coin_board(ctx, data, false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_modal_ids_carry_side_and_message() {
        let id = amount_modal_id(Side::Second, 987);
        assert_eq!(id, "bet:amount:second:987");
        assert_eq!(parse_amount_modal(&id), Some((Side::Second, 987)));
        assert_eq!(parse_amount_modal("bet:amount:third:1"), None);
        assert_eq!(parse_amount_modal("bet:amount:first:x"), None);
    }

    #[test]
    fn custom_ids_share_the_router_prefix() {
        for id in [FIRST_BUTTON, SECOND_BUTTON, AMOUNT_MODAL_PREFIX] {
            assert!(id.starts_with(BET_PREFIX));
        }
    }

    #[test]
    fn odds_read_as_ratios() {
        assert_eq!(odds_label(Some(2.0)), "1:2.00");
        assert_eq!(odds_label(Some(1.0 / 3.0 * 4.0)), "1:1.33");
        assert_eq!(odds_label(None), "-");
    }

    #[test]
    fn long_backer_lists_are_cut() {
        let mut prediction = Prediction::new(1, 1, "Red", "Blue").unwrap();
        for user in 0..20 {
            prediction.add_stake(user, Side::First, 10).unwrap();
        }
        let list = backers(&prediction, Side::First);
        assert_eq!(list.lines().count(), BACKERS_SHOWN + 1);
        assert!(list.ends_with("+5 more"));
        assert_eq!(backers(&prediction, Side::Second), "-");
    }
}
