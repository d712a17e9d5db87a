// Casino minigames. Each command checks its channel, hands the stake to the
// casino service and renders the result; interactive games (blackjack, dice
// duel) drive the game through button collectors.

use super::{ensure_channel, format_number, reply_ephemeral, signed, Context, Error};
use crate::core::casino::blackjack::hand_value;
use crate::core::casino::{
    render_cards, BlackjackGame, CasinoError, CoinSide, HandResult, RpsChoice, RpsResult,
    SlotsResult,
};
use crate::discord::boards::refresh_coin_board;
use poise::serenity_prelude as serenity;
use std::time::Duration;

const BLACKJACK_TIMEOUT: Duration = Duration::from_secs(120);
const DUEL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum CoinSideChoice {
    #[name = "Heads"]
    Heads,
    #[name = "Tails"]
    Tails,
}

impl From<CoinSideChoice> for CoinSide {
    fn from(choice: CoinSideChoice) -> Self {
        match choice {
            CoinSideChoice::Heads => CoinSide::Heads,
            CoinSideChoice::Tails => CoinSide::Tails,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RpsChoiceParam {
    #[name = "Rock"]
    Rock,
    #[name = "Paper"]
    Paper,
    #[name = "Scissors"]
    Scissors,
}

impl From<RpsChoiceParam> for RpsChoice {
    fn from(choice: RpsChoiceParam) -> Self {
        match choice {
            RpsChoiceParam::Rock => RpsChoice::Rock,
            RpsChoiceParam::Paper => RpsChoice::Paper,
            RpsChoiceParam::Scissors => RpsChoice::Scissors,
        }
    }
}

fn result_color(net: i64) -> u32 {
    match net.signum() {
        1 => 0x2ECC71,
        0 => 0x95A5A6,
        _ => 0xE74C3C,
    }
}

async fn after_game(ctx: Context<'_>) {
    if let Err(e) = refresh_coin_board(ctx.serenity_context(), ctx.data(), false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
}

/// Spin the slot machine
#[poise::command(slash_command, guild_only)]
pub async fn slots(
    ctx: Context<'_>,
    #[description = "Coins to bet"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.slots).await? {
        return Ok(());
    }

    let play = ctx
        .data()
        .casino
        .play_slots(ctx.author().id.get(), bet, ctx.id())
        .await?;

    let reels = play
        .reels
        .iter()
        .map(|s| s.emoji())
        .collect::<Vec<_>>()
        .join(" | ");
    let verdict = match play.result {
        SlotsResult::Triple(symbol) => format!("Three {}! Jackpot!", symbol.emoji()),
        SlotsResult::Pair(_) => "A pair, your bet is refunded.".to_string(),
        SlotsResult::Miss => "No match this time.".to_string(),
    };

    let embed = serenity::CreateEmbed::new()
        .title("🎰 Slots")
        .description(format!("**[ {reels} ]**\n\n{verdict}"))
        .color(result_color(play.net))
        .field("Result", signed(play.net), true)
        .field("Balance", format_number(play.balance), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    after_game(ctx).await;
    Ok(())
}

/// Call heads or tails
#[poise::command(slash_command, guild_only)]
pub async fn coinflip(
    ctx: Context<'_>,
    #[description = "Your call"] side: CoinSideChoice,
    #[description = "Coins to bet"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.coinflip).await? {
        return Ok(());
    }

    let play = ctx
        .data()
        .casino
        .play_coinflip(ctx.author().id.get(), bet, side.into(), ctx.id())
        .await?;

    let embed = serenity::CreateEmbed::new()
        .title("🪙 Coinflip")
        .description(format!("The coin landed on **{}**.", play.landed))
        .color(result_color(play.net))
        .field("Result", signed(play.net), true)
        .field("Balance", format_number(play.balance), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    after_game(ctx).await;
    Ok(())
}

/// Bet on a number (0-36) or a colour (red, black, green)
#[poise::command(slash_command, guild_only)]
pub async fn roulette(
    ctx: Context<'_>,
    #[description = "A number from 0 to 36, or red / black / green"] guess: String,
    #[description = "Coins to bet"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.roulette).await? {
        return Ok(());
    }

    let play = ctx
        .data()
        .casino
        .play_roulette(ctx.author().id.get(), bet, &guess, ctx.id())
        .await?;

    let color = crate::core::casino::games::pocket_color(play.pocket);
    let embed = serenity::CreateEmbed::new()
        .title("🎡 Roulette")
        .description(format!(
            "The ball landed on **{} ({color})**. You bet on `{}`.",
            play.pocket,
            guess.trim()
        ))
        .color(result_color(play.net))
        .field("Result", signed(play.net), true)
        .field("Balance", format_number(play.balance), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    after_game(ctx).await;
    Ok(())
}

/// Challenge another member to a dice duel
#[poise::command(slash_command, guild_only)]
pub async fn dice(
    ctx: Context<'_>,
    #[description = "Who to challenge"] opponent: serenity::User,
    #[description = "Coins each player puts in"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.dice_duel).await? {
        return Ok(());
    }

    let challenger = ctx.author().id.get();
    let casino = &ctx.data().casino;
    casino
        .check_duel(challenger, opponent.id.get(), opponent.bot, bet)
        .await?;

    let buttons = vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("duel_accept")
            .label("Accept")
            .style(serenity::ButtonStyle::Success),
        serenity::CreateButton::new("duel_decline")
            .label("Decline")
            .style(serenity::ButtonStyle::Danger),
    ])];
    let msg = ctx
        .send(
            poise::CreateReply::default()
                .content(format!(
                    "🎲 <@{}>, <@{challenger}> challenges you to a dice duel for **{}** coins!",
                    opponent.id,
                    format_number(bet)
                ))
                .components(buttons),
        )
        .await?;
    let msg_id = msg.message().await?.id;

    let answer = serenity::ComponentInteractionCollector::new(ctx)
        .author_id(opponent.id)
        .channel_id(ctx.channel_id())
        .timeout(DUEL_TIMEOUT)
        .filter(move |mci| mci.message.id == msg_id)
        .await;

    let Some(mci) = answer else {
        msg.edit(
            ctx,
            poise::CreateReply::default()
                .content("⌛ The duel challenge expired.")
                .components(vec![]),
        )
        .await?;
        return Ok(());
    };
    mci.defer(ctx.http()).await?;

    if mci.data.custom_id != "duel_accept" {
        msg.edit(
            ctx,
            poise::CreateReply::default()
                .content(format!("<@{}> declined the duel.", opponent.id))
                .components(vec![]),
        )
        .await?;
        return Ok(());
    }

    let text = match casino
        .resolve_duel(challenger, opponent.id.get(), bet, ctx.id())
        .await
    {
        Ok(play) => {
            let outcome = match play.challenger_net.signum() {
                1 => format!("<@{challenger}> wins **{}** coins!", format_number(bet)),
                -1 => format!("<@{}> wins **{}** coins!", opponent.id, format_number(bet)),
                _ => "It's a tie, both bets are refunded.".to_string(),
            };
            format!(
                "🎲 <@{challenger}> rolled **{}**, <@{}> rolled **{}**.\n{outcome}",
                play.challenger_roll, opponent.id, play.opponent_roll
            )
        }
        Err(e @ CasinoError::Economy(_)) | Err(e @ CasinoError::OpponentCannotAfford(_)) => {
            format!("❌ The duel was called off: {e}")
        }
        Err(e) => return Err(e.into()),
    };

    msg.edit(
        ctx,
        poise::CreateReply::default().content(text).components(vec![]),
    )
    .await?;
    after_game(ctx).await;
    Ok(())
}

/// Rock, paper, scissors against the bot (wins pay 2 coins)
#[poise::command(slash_command, guild_only)]
pub async fn rps(
    ctx: Context<'_>,
    #[description = "Your pick"] choice: RpsChoiceParam,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.rps).await? {
        return Ok(());
    }

    let choice: RpsChoice = choice.into();
    let play = ctx
        .data()
        .casino
        .play_rps(ctx.author().id.get(), choice, chrono::Utc::now(), ctx.id())
        .await?;

    let verdict = match play.result {
        RpsResult::Win => format!("You win **{}** coins!", play.reward),
        RpsResult::Draw => "It's a draw.".to_string(),
        RpsResult::Loss => "You lose.".to_string(),
    };
    ctx.say(format!(
        "{} vs {}: {verdict}",
        choice.emoji(),
        play.bot_choice.emoji()
    ))
    .await?;
    Ok(())
}

// ============================================================================
// BLACKJACK
// ============================================================================

fn blackjack_embed(game: &BlackjackGame, player: &str) -> serenity::CreateEmbed {
    let finished = game.is_finished();
    let dealer = if finished {
        format!(
            "{} ({})",
            render_cards(game.dealer()),
            hand_value(game.dealer())
        )
    } else {
        format!("{} 🂠", render_cards(&game.dealer()[..1]))
    };

    let title = if game.is_natural() {
        format!("🃏 Natural Blackjack! · {player}")
    } else {
        format!("🃏 Blackjack · {player}")
    };
    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .field("Dealer", dealer, false);

    let outcomes = finished.then(|| game.outcomes());
    for (i, hand) in game.hands().iter().enumerate() {
        let marker = if !finished && i == game.current_hand() && game.hands().len() > 1 {
            " ◀"
        } else {
            ""
        };
        let mut value = format!(
            "{} ({}) · stake {}{}",
            render_cards(&hand.cards),
            hand.value(),
            format_number(hand.stake),
            if hand.doubled { " · doubled" } else { "" }
        );
        if let Some(outcome) = outcomes.as_ref().and_then(|o| o.get(i)) {
            let label = match outcome.result {
                HandResult::Natural => "Blackjack!",
                HandResult::Bust => "Bust",
                HandResult::Win => "Win",
                HandResult::Lose => "Lose",
                HandResult::Push => "Push",
            };
            value.push_str(&format!("\n**{label}** {}", signed(outcome.net)));
        }
        embed = embed.field(format!("Hand {}{marker}", i + 1), value, false);
    }

    let color = if finished {
        result_color(game.net())
    } else {
        0x3498DB
    };
    embed.color(color)
}

fn blackjack_buttons(game: &BlackjackGame) -> Vec<serenity::CreateActionRow> {
    if game.is_finished() {
        return vec![];
    }
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("bj_hit")
            .label("Hit")
            .style(serenity::ButtonStyle::Primary),
        serenity::CreateButton::new("bj_stand")
            .label("Stand")
            .style(serenity::ButtonStyle::Secondary),
        serenity::CreateButton::new("bj_double")
            .label("Double")
            .style(serenity::ButtonStyle::Success)
            .disabled(!game.can_double()),
        serenity::CreateButton::new("bj_split")
            .label("Split")
            .style(serenity::ButtonStyle::Success)
            .disabled(!game.can_split()),
    ])]
}

/// Apply one button press to the game.
async fn blackjack_action(
    ctx: Context<'_>,
    game: &mut BlackjackGame,
    action: &str,
) -> Result<(), CasinoError> {
    let user_id = ctx.author().id.get();
    let casino = &ctx.data().casino;
    match action {
        "bj_hit" => game.hit()?,
        "bj_stand" => game.stand()?,
        "bj_double" => {
            casino
                .ensure_can_raise(user_id, game, game.double_cost())
                .await?;
            game.double_down()?
        }
        "bj_split" => {
            casino
                .ensure_can_raise(user_id, game, game.split_cost())
                .await?;
            game.split()?
        }
        _ => {}
    }
    Ok(())
}

/// Play a hand of blackjack against the dealer
#[poise::command(slash_command, guild_only)]
pub async fn blackjack(
    ctx: Context<'_>,
    #[description = "Coins to bet"] bet: i64,
) -> Result<(), Error> {
    if !ensure_channel(ctx, ctx.data().config.channels.blackjack).await? {
        return Ok(());
    }

    let user_id = ctx.author().id.get();
    let player = ctx.author().name.clone();
    let round_id = ctx.id();
    let mut game = ctx.data().casino.deal_blackjack(user_id, bet).await?;

    let msg = ctx
        .send(
            poise::CreateReply::default()
                .embed(blackjack_embed(&game, &player))
                .components(blackjack_buttons(&game)),
        )
        .await?;
    let msg_id = msg.message().await?.id;

    while !game.is_finished() {
        let Some(mci) = serenity::ComponentInteractionCollector::new(ctx)
            .author_id(ctx.author().id)
            .channel_id(ctx.channel_id())
            .timeout(BLACKJACK_TIMEOUT)
            .filter(move |mci| mci.message.id == msg_id)
            .await
        else {
            // Idle players stand on every remaining hand.
            while !game.is_finished() {
                game.stand()?;
            }
            break;
        };

        if let Err(e) = blackjack_action(ctx, &mut game, &mci.data.custom_id).await {
            mci.create_response(
                ctx,
                serenity::CreateInteractionResponse::Message(
                    serenity::CreateInteractionResponseMessage::new()
                        .content(format!("❌ {e}"))
                        .ephemeral(true),
                ),
            )
            .await?;
            continue;
        }

        mci.create_response(
            ctx,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .embed(blackjack_embed(&game, &player))
                    .components(blackjack_buttons(&game)),
            ),
        )
        .await?;
    }

    let balance = ctx
        .data()
        .casino
        .settle_blackjack(user_id, &game, round_id)
        .await?;

    msg.edit(
        ctx,
        poise::CreateReply::default()
            .embed(
                blackjack_embed(&game, &player)
                    .footer(serenity::CreateEmbedFooter::new(format!(
                        "Balance: {}",
                        format_number(balance)
                    ))),
            )
            .components(vec![]),
    )
    .await?;
    after_game(ctx).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_colours_follow_the_sign() {
        assert_eq!(result_color(50), 0x2ECC71);
        assert_eq!(result_color(0), 0x95A5A6);
        assert_eq!(result_color(-50), 0xE74C3C);
    }

    #[test]
    fn choices_map_to_core_types() {
        assert_eq!(CoinSide::from(CoinSideChoice::Tails), CoinSide::Tails);
        assert_eq!(RpsChoice::from(RpsChoiceParam::Paper), RpsChoice::Paper);
    }
}
