// `/autobalance`: split up to ten players into two even teams by MMR, then
// move each team into its voice channel with the buttons on the result.

use super::{ephemeral, reply_ephemeral, Context, Data, Error};
use crate::core::autobalance::{balance_teams, BalancePlayer, Team, TeamSplit, PLACEHOLDER_MMR};
use crate::core::custom_game::{Participant, LOBBY_CAPACITY};
use crate::core::valorant::ValorantError;
use poise::serenity_prelude as serenity;

pub const AUTOBALANCE_PREFIX: &str = "ab:";
const MOVE_A: &str = "ab:move:a";
const MOVE_B: &str = "ab:move:b";

fn move_button_team(custom_id: &str) -> Option<Team> {
    match custom_id {
        MOVE_A => Some(Team::A),
        MOVE_B => Some(Team::B),
        _ => None,
    }
}

fn team_listing(players: &[BalancePlayer]) -> String {
    players
        .iter()
        .map(|p| format!("{} (MMR: {})", p.label, p.mmr))
        .collect::<Vec<_>>()
        .join("\n")
}

fn result_embed(split: &TeamSplit) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("✅ Team balance")
        .description(format!(
            "MMR gap: **{}**\n\n**Team A** ({})\n{}\n\n**Team B** ({})\n{}",
            split.gap,
            split.total(Team::A),
            team_listing(&split.team_a),
            split.total(Team::B),
            team_listing(&split.team_b),
        ))
        .color(0x2ECC71)
}

fn move_buttons() -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(MOVE_A)
            .label("Move Team A to voice")
            .style(serenity::ButtonStyle::Primary),
        serenity::CreateButton::new(MOVE_B)
            .label("Move Team B to voice")
            .style(serenity::ButtonStyle::Secondary),
    ])]
}

/// Look up a linked player's MMR. Err carries the message for the user.
async fn linked_player(data: &Data, member_id: u64) -> Result<BalancePlayer, String> {
    match data.valorant.mmr_details(member_id).await {
        Ok(player) => Ok(BalancePlayer {
            label: player.riot_id(),
            member_id: Some(member_id),
            mmr: player.visible_mmr,
        }),
        Err(ValorantError::NotLinked) => Err(format!("<@{member_id}> has no linked Riot account.")),
        Err(e) => {
            tracing::warn!("MMR lookup for {member_id} failed: {e}");
            Err(format!("Could not load the MMR of <@{member_id}>."))
        }
    }
}

/// Players from the open custom game lobby. Placeholders count with the
/// minimum MMR.
async fn lobby_players(data: &Data) -> Result<Vec<BalancePlayer>, String> {
    let lobby = data
        .custom_game
        .current()
        .await
        .ok_or("There is no open custom game, mention the players instead.")?;
    if lobby.participants().len() != LOBBY_CAPACITY {
        return Err(format!(
            "The custom game needs {LOBBY_CAPACITY} players, it has {}.",
            lobby.participants().len()
        ));
    }

    let mut players = Vec::with_capacity(LOBBY_CAPACITY);
    for participant in lobby.participants() {
        players.push(match participant {
            Participant::Member(id) => linked_player(data, *id).await?,
            Participant::Placeholder(name) => BalancePlayer {
                label: name.clone(),
                member_id: None,
                mmr: PLACEHOLDER_MMR,
            },
        });
    }
    Ok(players)
}

async fn mentioned_players(data: &Data, ids: &[u64]) -> Result<Vec<BalancePlayer>, String> {
    let mut players = Vec::with_capacity(ids.len());
    for &id in ids {
        players.push(linked_player(data, id).await?);
    }
    Ok(players)
}

/// Balance two teams by MMR
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
#[allow(clippy::too_many_arguments)]
pub async fn autobalance(
    ctx: Context<'_>,
    #[description = "Player 1 (leave all empty to use the custom game)"] m1: Option<serenity::Member>,
    #[description = "Player 2"] m2: Option<serenity::Member>,
    #[description = "Player 3"] m3: Option<serenity::Member>,
    #[description = "Player 4"] m4: Option<serenity::Member>,
    #[description = "Player 5"] m5: Option<serenity::Member>,
    #[description = "Player 6"] m6: Option<serenity::Member>,
    #[description = "Player 7"] m7: Option<serenity::Member>,
    #[description = "Player 8"] m8: Option<serenity::Member>,
    #[description = "Player 9"] m9: Option<serenity::Member>,
    #[description = "Player 10"] m10: Option<serenity::Member>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();

    let mut mentioned: Vec<u64> = Vec::new();
    for id in [m1, m2, m3, m4, m5, m6, m7, m8, m9, m10]
        .into_iter()
        .flatten()
        .map(|m| m.user.id.get())
    {
        if !mentioned.contains(&id) {
            mentioned.push(id);
        }
    }

    let players = if mentioned.is_empty() {
        lobby_players(data).await
    } else {
        mentioned_players(data, &mentioned).await
    };
    let players = match players {
        Ok(p) => p,
        Err(text) => return reply_ephemeral(ctx, format!("❌ {text}")).await,
    };

    let split = match balance_teams(&players) {
        Ok(split) => split,
        Err(e) => return reply_ephemeral(ctx, format!("❌ {e}")).await,
    };

    let handle = ctx
        .send(
            poise::CreateReply::default()
                .embed(result_embed(&split))
                .components(move_buttons()),
        )
        .await?;
    let message = handle.message().await?;
    let gap = split.gap;
    data.splits
        .remember(message.id.get(), split, chrono::Utc::now());

    tracing::info!(gap, players = players.len(), "Teams balanced");
    data.audit
        .send(
            ctx.http(),
            format!("⚖️ <@{}> balanced teams (gap {gap})", ctx.author().id),
        )
        .await;
    Ok(())
}

/// Move buttons under a balance result.
pub async fn handle_move_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let Some(team) = move_button_team(&interaction.data.custom_id) else {
        return Ok(());
    };
    let can_move = interaction
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.move_members());
    if !can_move {
        interaction
            .create_response(ctx, ephemeral("❌ You need Move Members to do that."))
            .await?;
        return Ok(());
    }

    let voice = match team {
        Team::A => data.config.channels.team_a_voice,
        Team::B => data.config.channels.team_b_voice,
    };
    let (Some(voice), Some(guild_id)) = (voice, interaction.guild_id) else {
        interaction
            .create_response(ctx, ephemeral("❌ Team voice channels are not configured."))
            .await?;
        return Ok(());
    };
    let Some(members) = data.splits.members(interaction.message.id.get(), team) else {
        interaction
            .create_response(ctx, ephemeral("❌ These teams have expired, balance again."))
            .await?;
        return Ok(());
    };

    interaction.defer_ephemeral(ctx).await?;
    let mut moved = Vec::new();
    for member in members {
        let user = serenity::UserId::new(member);
        match guild_id
            .move_member(ctx, user, serenity::ChannelId::new(voice))
            .await
        {
            Ok(_) => moved.push(format!("<@{member}>")),
            // Members that are not connected to voice cannot be moved.
            Err(e) => tracing::debug!("Could not move {member}: {e}"),
        }
    }

    let text = if moved.is_empty() {
        "Nobody could be moved.".to_string()
    } else {
        format!("Moved to <#{voice}>:\n{}", moved.join("\n"))
    };
    interaction
        .create_followup(
            ctx,
            serenity::CreateInteractionResponseFollowup::new()
                .content(text)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_buttons_name_their_team() {
        assert_eq!(move_button_team("ab:move:a"), Some(Team::A));
        assert_eq!(move_button_team("ab:move:b"), Some(Team::B));
        assert_eq!(move_button_team("ab:move:c"), None);
        assert!(MOVE_A.starts_with(AUTOBALANCE_PREFIX));
        assert!(MOVE_B.starts_with(AUTOBALANCE_PREFIX));
    }

    #[test]
    fn listing_shows_label_and_mmr() {
        let players = vec![
            BalancePlayer {
                label: "Sova#NA1".to_string(),
                member_id: Some(1),
                mmr: 1450,
            },
            BalancePlayer {
                label: "Player3".to_string(),
                member_id: None,
                mmr: PLACEHOLDER_MMR,
            },
        ];
        assert_eq!(team_listing(&players), "Sova#NA1 (MMR: 1450)\nPlayer3 (MMR: 1)");
    }
}
