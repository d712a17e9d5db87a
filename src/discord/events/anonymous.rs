// Anonymous board: a DM to the bot is reposted to the board channel without
// its author. The admin and the staff log still learn who wrote it, keyed by
// the post's reference number.

use crate::core::anonymous::{check_post, AttachmentInfo};
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

fn post_embed(
    content: &str,
    image: Option<&str>,
    reference: Option<u64>,
) -> serenity::CreateEmbed {
    let footer = match reference {
        Some(id) => format!("Ref: {id}"),
        None => "Ref: pending".to_string(),
    };
    let mut embed = serenity::CreateEmbed::new()
        .author(serenity::CreateEmbedAuthor::new("Anonymous post"))
        .description(if content.is_empty() { "\u{200b}" } else { content })
        .footer(serenity::CreateEmbedFooter::new(footer))
        .color(0x5865F2)
        .timestamp(serenity::Timestamp::now());
    if let Some(filename) = image {
        embed = embed.image(format!("attachment://{filename}"));
    }
    embed
}

/// Room left for the post text in the staff log message.
const LOG_CONTENT_CHARS: usize = 1500;

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

async fn reply(ctx: &Context, message: &serenity::Message, text: impl Into<String>) {
    if let Err(e) = message.channel_id.say(ctx, text).await {
        tracing::debug!("Could not answer anonymous DM from {}: {e}", message.author.id);
    }
}

pub async fn handle_direct_message(
    ctx: &Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<()> {
    if message.author.bot || message.guild_id.is_some() {
        return Ok(());
    }
    let Some(board) = data.config.channels.anon_board else {
        return Ok(());
    };

    let infos: Vec<AttachmentInfo> = message
        .attachments
        .iter()
        .map(|a| AttachmentInfo {
            filename: a.filename.clone(),
            size: u64::from(a.size),
        })
        .collect();
    let image = match check_post(&message.content, &infos) {
        Ok(image) => image.map(|a| a.filename.clone()),
        Err(e) => {
            reply(ctx, message, format!("⚠️ {e}")).await;
            return Ok(());
        }
    };

    let mut files = Vec::with_capacity(message.attachments.len());
    for attachment in &message.attachments {
        let bytes = attachment.download().await?;
        files.push(serenity::CreateAttachment::bytes(bytes, attachment.filename.clone()));
    }

    let content = message.content.trim();
    let mut post = serenity::ChannelId::new(board)
        .send_files(
            ctx,
            files,
            serenity::CreateMessage::new().embed(post_embed(content, image.as_deref(), None)),
        )
        .await?;
    let reference = post.id.get();
    post.edit(
        ctx,
        serenity::EditMessage::new().embed(post_embed(content, image.as_deref(), Some(reference))),
    )
    .await?;
    tracing::info!(reference, files = message.attachments.len(), "Anonymous post published");

    if let Some(admin) = data.config.admin_user_id {
        let text = format!(
            "📩 New anonymous post\nAuthor: {} ({})\nRef: {reference}",
            message.author.name, message.author.id
        );
        if let Err(e) = serenity::UserId::new(admin)
            .direct_message(ctx, serenity::CreateMessage::new().content(text))
            .await
        {
            tracing::warn!("Could not notify the admin about post {reference}: {e}");
        }
    }

    if let Some(log) = data.config.channels.anon_log {
        let shown = if content.is_empty() {
            "-".to_string()
        } else {
            clip(content, LOG_CONTENT_CHARS)
        };
        let text = format!(
            "📩 Anonymous post recorded\nRef: {reference}\nContent: {shown}\nAttachments: {}",
            message.attachments.len()
        );
        if let Err(e) = serenity::ChannelId::new(log).say(ctx, text).await {
            tracing::warn!("Could not log anonymous post {reference}: {e}");
        }
    }

    reply(ctx, message, "✅ Your post is up on the anonymous board. Thank you!").await;
    Ok(())
}
