// Custom game lobbies: one open lobby at a time, managed through
// `/customgame` and the buttons on the lobby message.

use super::{author_roles, reply_ephemeral, Context, Data, Error};
use crate::core::custom_game::{Lobby, ReminderBatch, LOBBY_CAPACITY};
use crate::core::valorant::ValorantError;
use poise::serenity_prelude as serenity;

pub const LOBBY_BUTTON_PREFIX: &str = "cg:";
const JOIN: &str = "cg:join";
const LEAVE: &str = "cg:leave";
const WAITLIST_JOIN: &str = "cg:waitlist_join";
const WAITLIST_LEAVE: &str = "cg:waitlist_leave";

/// Lobby matches recorded when a game is finished.
const FINISH_MATCH_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ZoneChoice {
    #[name = "EST"]
    Est,
    #[name = "CST"]
    Cst,
    #[name = "PST"]
    Pst,
}

impl ZoneChoice {
    fn key(self) -> &'static str {
        match self {
            ZoneChoice::Est => "est",
            ZoneChoice::Cst => "cst",
            ZoneChoice::Pst => "pst",
        }
    }
}

fn lobby_embed(data: &Data, lobby: &Lobby) -> serenity::CreateEmbed {
    let times = data
        .custom_game
        .format_start(lobby.starts_at)
        .iter()
        .map(|t| format!("**{}** {}", t.label, t.twelve_hour))
        .collect::<Vec<_>>()
        .join(" · ");

    let mut roster = lobby
        .participants()
        .iter()
        .enumerate()
        .map(|(i, p)| format!("`{:>2}.` {}", i + 1, p.mention()))
        .collect::<Vec<_>>()
        .join("\n");
    if roster.is_empty() {
        roster = "Nobody yet, press Join!".to_string();
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("🎮 Custom Game")
        .description(format!(
            "Hosted by <@{}>\nStarts <t:{}:R>\n{times}",
            lobby.creator_id,
            lobby.starts_at.timestamp()
        ))
        .field(
            format!("Players ({}/{LOBBY_CAPACITY})", lobby.participants().len()),
            roster,
            false,
        )
        .color(0x9B59B6);

    if lobby.waitlist_open() {
        let waitlist = if lobby.waitlist().is_empty() {
            "Empty".to_string()
        } else {
            lobby
                .waitlist()
                .iter()
                .map(|id| format!("<@{id}>"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        embed = embed.field("Waitlist", waitlist, false);
    }
    embed
}

fn lobby_buttons(lobby: &Lobby) -> Vec<serenity::CreateActionRow> {
    let mut buttons = vec![
        serenity::CreateButton::new(JOIN)
            .label("Join")
            .style(serenity::ButtonStyle::Success)
            .disabled(lobby.is_full()),
        serenity::CreateButton::new(LEAVE)
            .label("Leave")
            .style(serenity::ButtonStyle::Danger),
    ];
    if lobby.waitlist_open() {
        buttons.push(
            serenity::CreateButton::new(WAITLIST_JOIN)
                .label("Join waitlist")
                .style(serenity::ButtonStyle::Primary),
        );
        buttons.push(
            serenity::CreateButton::new(WAITLIST_LEAVE)
                .label("Leave waitlist")
                .style(serenity::ButtonStyle::Secondary),
        );
    }
    vec![serenity::CreateActionRow::Buttons(buttons)]
}

/// Re-render the lobby message after a command changed the lobby.
async fn refresh_lobby_message(ctx: &serenity::Context, data: &Data, lobby: &Lobby) {
    let Some(message_id) = lobby.message_id else {
        return;
    };
    let edit = serenity::EditMessage::new()
        .embed(lobby_embed(data, lobby))
        .components(lobby_buttons(lobby));
    if let Err(e) = serenity::ChannelId::new(lobby.channel_id)
        .edit_message(ctx, serenity::MessageId::new(message_id), edit)
        .await
    {
        tracing::warn!("Failed to update the lobby message: {e}");
    }
}

async fn close_lobby_message(ctx: &serenity::Context, lobby: &Lobby, text: &str) {
    let Some(message_id) = lobby.message_id else {
        return;
    };
    let edit = serenity::EditMessage::new()
        .content(text)
        .components(vec![]);
    if let Err(e) = serenity::ChannelId::new(lobby.channel_id)
        .edit_message(ctx, serenity::MessageId::new(message_id), edit)
        .await
    {
        tracing::warn!("Failed to close the lobby message: {e}");
    }
}

/// Custom game lobby
#[poise::command(
    slash_command,
    guild_only,
    subcommands("start", "waitlist", "addbots", "map", "finish", "cancel")
)]
pub async fn customgame(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(
        "Custom game commands:\n\
        `/customgame start <time> <zone>` - Open a lobby\n\
        `/customgame waitlist` - Open the waitlist once the lobby is full\n\
        `/customgame addbots` - Fill free seats with placeholders\n\
        `/customgame map` - Roll a random map\n\
        `/customgame finish` - Close the lobby and record the matches\n\
        `/customgame cancel` - Close the lobby without recording",
    )
    .await?;
    Ok(())
}

/// Open a custom game lobby
#[poise::command(slash_command, guild_only)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Start time, e.g. 21:30 or 9:30 PM"] time: String,
    #[description = "Timezone of that time"] zone: ZoneChoice,
) -> Result<(), Error> {
    let data = ctx.data();
    let lobby = data
        .custom_game
        .open(
            ctx.author().id.get(),
            ctx.channel_id().get(),
            &time,
            zone.key(),
            chrono::Utc::now(),
        )
        .await?;

    let ping = data
        .config
        .roles
        .custom_game
        .map(|role| format!("<@&{role}> "))
        .unwrap_or_default();
    let handle = ctx
        .send(
            poise::CreateReply::default()
                .content(format!("{ping}A custom game is open!"))
                .embed(lobby_embed(data, &lobby))
                .components(lobby_buttons(&lobby))
                .allowed_mentions(serenity::CreateAllowedMentions::new().all_roles(true)),
        )
        .await?;
    let message = handle.message().await?;
    data.custom_game.set_message(message.id.get()).await?;

    data.audit
        .send(
            ctx.http(),
            format!("<@{}> opened a custom game", ctx.author().id),
        )
        .await;
    Ok(())
}

/// Open the waitlist
#[poise::command(slash_command, guild_only)]
pub async fn waitlist(ctx: Context<'_>) -> Result<(), Error> {
    let roles = author_roles(ctx).await;
    let lobby = ctx
        .data()
        .custom_game
        .open_waitlist(ctx.author().id.get(), &roles)
        .await?;
    refresh_lobby_message(ctx.serenity_context(), ctx.data(), &lobby).await;
    reply_ephemeral(ctx, "✅ Waitlist opened.").await
}

/// Fill the free seats with placeholder players
#[poise::command(slash_command, guild_only)]
pub async fn addbots(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let roles = author_roles(ctx).await;
    let (lobby, added) = data
        .custom_game
        .fill_placeholders(ctx.author().id.get(), &roles)
        .await?;
    refresh_lobby_message(ctx.serenity_context(), data, &lobby).await;
    reply_ephemeral(ctx, format!("✅ Added {added} placeholder players.")).await
}

/// Roll a random map
#[poise::command(slash_command, guild_only)]
pub async fn map(ctx: Context<'_>) -> Result<(), Error> {
    let roles = author_roles(ctx).await;
    let map = ctx
        .data()
        .custom_game
        .roll_map(ctx.author().id.get(), &roles)
        .await?;
    ctx.say(format!("🗺️ The map is **{map}**!")).await?;
    Ok(())
}

/// Close the lobby and record its matches
#[poise::command(slash_command, guild_only)]
pub async fn finish(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let roles = author_roles(ctx).await;
    let lobby = data
        .custom_game
        .cancel(ctx.author().id.get(), &roles)
        .await?;
    close_lobby_message(ctx.serenity_context(), &lobby, "🏁 This custom game has finished.").await;

    let recorded = match data
        .valorant
        .record_lobby_matches(lobby.creator_id, FINISH_MATCH_LIMIT)
        .await
    {
        Ok(n) => format!("Recorded {n} lobby matches."),
        Err(ValorantError::NotLinked) => {
            "The host has no linked Riot account, no matches recorded.".to_string()
        }
        Err(e) => {
            tracing::warn!("Recording lobby matches failed: {e}");
            "Matches could not be recorded right now.".to_string()
        }
    };

    ctx.say(format!("🏁 Custom game finished. {recorded}")).await?;
    data.audit
        .send(
            ctx.http(),
            format!("<@{}> finished the custom game. {recorded}", ctx.author().id),
        )
        .await;
    Ok(())
}

/// Close the lobby without recording
#[poise::command(slash_command, guild_only)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let roles = author_roles(ctx).await;
    let lobby = ctx
        .data()
        .custom_game
        .cancel(ctx.author().id.get(), &roles)
        .await?;
    close_lobby_message(ctx.serenity_context(), &lobby, "❌ This custom game was cancelled.").await;
    ctx.say("❌ Custom game cancelled.").await?;
    Ok(())
}

/// Join / leave buttons on the lobby message.
pub async fn handle_lobby_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let user_id = interaction.user.id.get();
    let service = &data.custom_game;

    let outcome = match interaction.data.custom_id.as_str() {
        JOIN => service.join(user_id).await.map(|l| (l, None)),
        LEAVE => service.leave(user_id).await,
        WAITLIST_JOIN => service.join_waitlist(user_id).await.map(|l| (l, None)),
        WAITLIST_LEAVE => service.leave_waitlist(user_id).await.map(|l| (l, None)),
        _ => return Ok(()),
    };

    match outcome {
        Ok((lobby, promoted)) => {
            interaction
                .create_response(
                    ctx,
                    serenity::CreateInteractionResponse::UpdateMessage(
                        serenity::CreateInteractionResponseMessage::new()
                            .embed(lobby_embed(data, &lobby))
                            .components(lobby_buttons(&lobby)),
                    ),
                )
                .await?;
            if let Some(promoted) = promoted {
                serenity::ChannelId::new(lobby.channel_id)
                    .say(
                        ctx,
                        format!("<@{promoted}> moved up from the waitlist into the lobby!"),
                    )
                    .await?;
            }
        }
        Err(e) => {
            interaction
                .create_response(
                    ctx,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content(format!("❌ {e}"))
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }
    Ok(())
}

/// Members of `members` who are not in the voice channel right now.
fn absent_from_voice(
    ctx: &serenity::Context,
    channel_id: u64,
    voice_channel: u64,
    members: &[u64],
) -> Vec<u64> {
    let guild_id = ctx
        .cache
        .channel(serenity::ChannelId::new(channel_id))
        .map(|c| c.guild_id);
    let in_voice: Vec<u64> = guild_id
        .and_then(|g| ctx.cache.guild(g))
        .map(|guild| {
            guild
                .voice_states
                .values()
                .filter(|vs| vs.channel_id.map(|c| c.get()) == Some(voice_channel))
                .map(|vs| vs.user_id.get())
                .collect()
        })
        .unwrap_or_default();
    members
        .iter()
        .copied()
        .filter(|m| !in_voice.contains(m))
        .collect()
}

fn mentions(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| format!("<@{id}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Send whatever reminders the lobby has due. Called every 30 seconds.
pub async fn send_reminders(ctx: &serenity::Context, data: &Data, batch: ReminderBatch) {
    let channel = serenity::ChannelId::new(batch.channel_id);

    if batch.due.warning && !batch.members.is_empty() {
        let text = format!(
            "⏰ The custom game starts in 30 minutes! {}",
            mentions(&batch.members)
        );
        if let Err(e) = channel.say(ctx, text).await {
            tracing::warn!("Failed to send the custom game warning: {e}");
        }
    }

    let (Some(minutes), Some(voice)) = (batch.due.voice_check, data.config.channels.custom_game_voice)
    else {
        return;
    };
    let absent = absent_from_voice(ctx, batch.channel_id, voice, &batch.members);
    if absent.is_empty() {
        return;
    }
    let text = format!(
        "🔊 The custom game starts in {minutes} minute{}! Please join <#{voice}>: {}",
        if minutes == 1 { "" } else { "s" },
        mentions(&absent)
    );
    if let Err(e) = channel.say(ctx, text).await {
        tracing::warn!("Failed to send the voice check: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_map_to_service_keys() {
        assert_eq!(ZoneChoice::Est.key(), "est");
        assert_eq!(ZoneChoice::Cst.key(), "cst");
        assert_eq!(ZoneChoice::Pst.key(), "pst");
    }

    #[test]
    fn mentions_are_space_separated() {
        assert_eq!(mentions(&[1, 22]), "<@1> <@22>");
        assert_eq!(mentions(&[]), "");
    }

    #[test]
    fn button_ids_share_the_router_prefix() {
        for id in [JOIN, LEAVE, WAITLIST_JOIN, WAITLIST_LEAVE] {
            assert!(id.starts_with(LOBBY_BUTTON_PREFIX));
        }
    }
}
