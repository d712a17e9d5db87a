// Member join/leave: welcome and goodbye embeds, the Unverified join gate
// and nickname tracking for linked players.

use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context, Mentionable};

fn channel_link(id: Option<u64>) -> String {
    id.map(|c| format!("<#{c}>")).unwrap_or_else(|| "-".to_string())
}

fn welcome_embed(data: &Data, member: &serenity::Member, member_count: u64) -> serenity::CreateEmbed {
    let channels = &data.config.channels;
    serenity::CreateEmbed::new()
        .title("👋 Welcome to the studio!")
        .description(format!(
            "Hey {}, glad you're here! You're member **#{member_count}**.",
            member.mention()
        ))
        .field("📜 Rules", channel_link(channels.rules), true)
        .field("🎭 Roles", channel_link(channels.role_assign), true)
        .field("📢 Announcements", channel_link(channels.announcements), true)
        .thumbnail(member.face())
        .color(0x57F287)
        .timestamp(serenity::Timestamp::now())
}

pub async fn handle_member_join(
    ctx: &Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<()> {
    if member.user.bot {
        return Ok(());
    }

    if let Some(role) = data.config.roles.unverified {
        if let Err(e) = member.add_role(ctx, serenity::RoleId::new(role)).await {
            tracing::warn!("Could not add Unverified role to {}: {e}", member.user.id);
        }
    }

    if let Some(channel) = data.config.channels.welcome {
        let member_count = ctx
            .cache
            .guild(member.guild_id)
            .map(|g| g.member_count)
            .unwrap_or_default();
        serenity::ChannelId::new(channel)
            .send_message(
                ctx,
                serenity::CreateMessage::new()
                    .content(member.mention().to_string())
                    .embed(welcome_embed(data, member, member_count)),
            )
            .await?;
    }

    tracing::info!(user_id = member.user.id.get(), "Member joined");
    Ok(())
}

pub async fn handle_member_leave(ctx: &Context, data: &Data, user: &serenity::User) -> Result<()> {
    if user.bot {
        return Ok(());
    }
    tracing::info!(user_id = user.id.get(), "Member left");

    let Some(channel) = data.config.channels.leave else {
        return Ok(());
    };
    let embed = serenity::CreateEmbed::new()
        .title("👋 Goodbye")
        .description(format!("**{}** ({}) left the server.", user.name, user.mention()))
        .thumbnail(user.face())
        .color(0xED4245)
        .timestamp(serenity::Timestamp::now());
    serenity::ChannelId::new(channel)
        .send_message(ctx, serenity::CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Name shown in the server: nickname, then global name, then username.
fn shown_name(event: &serenity::GuildMemberUpdateEvent) -> String {
    event
        .nick
        .clone()
        .or_else(|| event.user.global_name.clone())
        .unwrap_or_else(|| event.user.name.clone())
}

pub async fn handle_member_update(
    data: &Data,
    old: Option<&serenity::Member>,
    event: &serenity::GuildMemberUpdateEvent,
) -> Result<()> {
    if event.user.bot {
        return Ok(());
    }
    let name = shown_name(event);
    if old.is_some_and(|m| m.display_name() == name) {
        return Ok(());
    }

    if data.valorant.update_nick(event.user.id.get(), &name).await? {
        tracing::debug!(user_id = event.user.id.get(), nick = %name, "Stored nickname updated");
    }
    Ok(())
}
