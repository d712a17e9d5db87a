// Support tickets: a button in the help channel opens a private channel,
// closing it archives an HTML transcript to the history channel.

use super::{reply_ephemeral, Context, Data, Error};
use crate::core::tickets::{
    can_close, render_transcript, ticket_channel_name, TicketError, TranscriptAttachment,
    TranscriptMessage, TranscriptMeta, TRANSCRIPT_MESSAGE_LIMIT,
};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

pub const TICKET_BUTTON_PREFIX: &str = "ticket:";
pub const OPEN_TICKET_BUTTON: &str = "ticket:open";
pub const CLOSE_TICKET_BUTTON: &str = "ticket:close";

/// Post the "open a ticket" panel
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ctx
        .data()
        .config
        .channels
        .help
        .map(serenity::ChannelId::new)
        .unwrap_or_else(|| ctx.channel_id());

    let embed = serenity::CreateEmbed::new()
        .title("🎫 Need help?")
        .description(
            "Press the button below to open a private ticket with the support team.\n\
            Only you and support can see it.",
        )
        .color(0x3498DB);
    let button = serenity::CreateButton::new(OPEN_TICKET_BUTTON)
        .label("Open ticket")
        .emoji('🎫')
        .style(serenity::ButtonStyle::Primary);

    channel
        .send_message(
            ctx.http(),
            serenity::CreateMessage::new()
                .embed(embed)
                .components(vec![serenity::CreateActionRow::Buttons(vec![button])]),
        )
        .await?;
    reply_ephemeral(ctx, format!("✅ Ticket panel posted in <#{channel}>.")).await
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    text: impl Into<String>,
) -> anyhow::Result<()> {
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

pub async fn handle_ticket_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let result = match interaction.data.custom_id.as_str() {
        OPEN_TICKET_BUTTON => open_ticket(ctx, interaction, data).await,
        CLOSE_TICKET_BUTTON => close_ticket(ctx, interaction, data).await,
        _ => return Ok(()),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<TicketError>() {
            Some(ticket_error) => {
                respond_ephemeral(ctx, interaction, format!("❌ {ticket_error}")).await
            }
            None => Err(e),
        },
    }
}

fn ticket_overwrites(
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    support_role: Option<u64>,
) -> Vec<serenity::PermissionOverwrite> {
    let member_allow = serenity::Permissions::VIEW_CHANNEL
        | serenity::Permissions::SEND_MESSAGES
        | serenity::Permissions::ATTACH_FILES
        | serenity::Permissions::READ_MESSAGE_HISTORY;

    let mut overwrites = vec![
        serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::VIEW_CHANNEL,
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id.get())),
        },
        serenity::PermissionOverwrite {
            allow: member_allow,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(user_id),
        },
    ];
    if let Some(role) = support_role {
        overwrites.push(serenity::PermissionOverwrite {
            allow: serenity::Permissions::VIEW_CHANNEL
                | serenity::Permissions::SEND_MESSAGES
                | serenity::Permissions::READ_MESSAGE_HISTORY,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(role)),
        });
    }
    overwrites
}

async fn open_ticket(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let guild_id = interaction
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("ticket button pressed outside a guild"))?;
    let user = &interaction.user;
    let name = ticket_channel_name(user.id.get());

    let channels = guild_id.channels(ctx).await?;
    if let Some(existing) = channels.values().find(|c| c.name == name) {
        return Err(TicketError::AlreadyOpen(existing.id.get()).into());
    }

    let mut builder = serenity::CreateChannel::new(name.as_str())
        .kind(serenity::ChannelType::Text)
        .permissions(ticket_overwrites(
            guild_id,
            user.id,
            data.config.roles.support,
        ));
    if let Some(category) = data.config.channels.ticket_category {
        builder = builder.category(serenity::ChannelId::new(category));
    }
    let channel = guild_id.create_channel(ctx, builder).await?;

    let close = serenity::CreateButton::new(CLOSE_TICKET_BUTTON)
        .label("Close ticket")
        .emoji('🔒')
        .style(serenity::ButtonStyle::Danger);
    let support_ping = data
        .config
        .roles
        .support
        .map(|r| format!(" <@&{r}>"))
        .unwrap_or_default();
    channel
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .content(format!("<@{}>{support_ping}", user.id))
                .embed(
                    serenity::CreateEmbed::new()
                        .title("🎫 Ticket opened")
                        .description(
                            "Describe your problem and support will be with you shortly.\n\
                            Press the button when you're done.",
                        )
                        .color(0x2ECC71),
                )
                .components(vec![serenity::CreateActionRow::Buttons(vec![close])]),
        )
        .await?;

    respond_ephemeral(ctx, interaction, format!("✅ Your ticket: <#{}>", channel.id)).await?;
    data.audit
        .send(&ctx.http, format!("<@{}> opened ticket <#{}>", user.id, channel.id))
        .await;
    Ok(())
}

fn to_utc(ts: serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_default()
}

fn is_image(attachment: &serenity::Attachment) -> bool {
    attachment
        .content_type
        .as_deref()
        .is_some_and(|t| t.starts_with("image/"))
}

async fn transcript_message(message: &serenity::Message) -> TranscriptMessage {
    let mut attachments = Vec::new();
    for att in message.attachments.iter().filter(|a| is_image(a)) {
        match att.download().await {
            Ok(bytes) => attachments.push(TranscriptAttachment {
                filename: att.filename.clone(),
                content_type: att.content_type.clone(),
                bytes,
            }),
            Err(e) => tracing::warn!("Skipping attachment {}: {e}", att.filename),
        }
    }

    TranscriptMessage {
        author: message.author.name.clone(),
        avatar_url: Some(message.author.face()),
        sent_at: to_utc(message.timestamp),
        content: message.content.clone(),
        attachments,
    }
}

async fn close_ticket(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let channel = interaction
        .channel_id
        .to_channel(ctx)
        .await?
        .guild()
        .ok_or(TicketError::NotATicket)?;
    let roles: Vec<u64> = interaction
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();
    let owner_id = can_close(
        &channel.name,
        interaction.user.id.get(),
        &roles,
        data.config.roles.support,
    )?;

    interaction.defer_ephemeral(ctx).await?;

    let mut messages = channel
        .id
        .messages(
            ctx,
            serenity::GetMessages::new().limit(TRANSCRIPT_MESSAGE_LIMIT),
        )
        .await?;
    messages.reverse();

    let mut lines = Vec::with_capacity(messages.len());
    for message in &messages {
        lines.push(transcript_message(message).await);
    }

    let owner = match serenity::UserId::new(owner_id).to_user(ctx).await {
        Ok(user) => user.name,
        Err(_) => owner_id.to_string(),
    };
    let bot_name = ctx.cache.current_user().name.clone();
    let meta = TranscriptMeta {
        channel_name: channel.name.clone(),
        created_at: to_utc(channel.id.created_at()),
        owner,
        generated_by: bot_name,
        generated_at: Utc::now(),
    };
    let html = render_transcript(&meta, &lines);

    if let Some(history) = data.config.channels.ticket_history {
        let embed = serenity::CreateEmbed::new()
            .title(format!("🗂️ Transcript: {}", channel.name))
            .field("Owner", format!("<@{owner_id}>"), true)
            .field("Closed by", format!("<@{}>", interaction.user.id), true)
            .field("Messages", lines.len().to_string(), true)
            .color(0x95A5A6)
            .timestamp(serenity::Timestamp::now());
        serenity::ChannelId::new(history)
            .send_message(
                ctx,
                serenity::CreateMessage::new()
                    .embed(embed)
                    .add_file(serenity::CreateAttachment::bytes(
                        html.into_bytes(),
                        format!("{}.html", channel.name),
                    )),
            )
            .await?;
    } else {
        tracing::warn!("TICKET_HISTORY_CHANNEL_ID not set, transcript for {} dropped", channel.name);
    }

    channel.id.delete(ctx).await?;
    data.audit
        .send(
            &ctx.http,
            format!("<@{}> closed ticket {}", interaction.user.id, channel.name),
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_hides_from_everyone_and_grants_support() {
        let guild = serenity::GuildId::new(100);
        let user = serenity::UserId::new(7);
        let overwrites = ticket_overwrites(guild, user, Some(55));

        assert_eq!(overwrites.len(), 3);
        assert_eq!(
            overwrites[0].kind,
            serenity::PermissionOverwriteType::Role(serenity::RoleId::new(100))
        );
        assert!(overwrites[0].deny.contains(serenity::Permissions::VIEW_CHANNEL));
        assert!(overwrites[1].allow.contains(serenity::Permissions::ATTACH_FILES));
        assert_eq!(
            overwrites[2].kind,
            serenity::PermissionOverwriteType::Role(serenity::RoleId::new(55))
        );
    }

    #[test]
    fn no_support_overwrite_without_role() {
        let overwrites =
            ticket_overwrites(serenity::GuildId::new(1), serenity::UserId::new(2), None);
        assert_eq!(overwrites.len(), 2);
    }

    #[test]
    fn button_ids_share_the_router_prefix() {
        assert!(OPEN_TICKET_BUTTON.starts_with(TICKET_BUTTON_PREFIX));
        assert!(CLOSE_TICKET_BUTTON.starts_with(TICKET_BUTTON_PREFIX));
    }
}
