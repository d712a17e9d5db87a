// Reaction roles: grant/revoke mapped roles and keep the configured
// messages carrying every mapped reaction.

use crate::core::reactions::missing_reactions;
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

#[derive(Debug, Clone, Copy, PartialEq)]
enum RoleChange {
    Add,
    Remove,
}

fn reacting_bot(ctx: &Context, reaction: &serenity::Reaction) -> bool {
    if let Some(member) = &reaction.member {
        return member.user.bot;
    }
    reaction
        .user_id
        .and_then(|id| ctx.cache.user(id).map(|u| u.bot))
        .unwrap_or(false)
}

async fn apply(
    ctx: &Context,
    data: &Data,
    reaction: &serenity::Reaction,
    change: RoleChange,
) -> Result<()> {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return Ok(());
    };
    if !data.reaction_roles.is_tracked(reaction.message_id.get()) || reacting_bot(ctx, reaction) {
        return Ok(());
    }

    let emoji = reaction.emoji.to_string();
    let roles = data
        .reaction_roles
        .roles_for(reaction.message_id.get(), &emoji);

    for role in roles.into_iter().map(serenity::RoleId::new) {
        let result = match change {
            RoleChange::Add => {
                ctx.http
                    .add_member_role(guild_id, user_id, role, Some("Reaction role"))
                    .await
            }
            RoleChange::Remove => {
                ctx.http
                    .remove_member_role(guild_id, user_id, role, Some("Reaction role"))
                    .await
            }
        };
        match result {
            Ok(()) => tracing::info!(
                user_id = user_id.get(),
                role_id = role.get(),
                ?change,
                "Reaction role applied"
            ),
            Err(e) => tracing::warn!("Reaction role {change:?} failed for {user_id}: {e}"),
        }
    }
    Ok(())
}

pub async fn handle_reaction_add(
    ctx: &Context,
    data: &Data,
    reaction: &serenity::Reaction,
) -> Result<()> {
    apply(ctx, data, reaction, RoleChange::Add).await
}

pub async fn handle_reaction_remove(
    ctx: &Context,
    data: &Data,
    reaction: &serenity::Reaction,
) -> Result<()> {
    apply(ctx, data, reaction, RoleChange::Remove).await
}

/// Add any mapped reaction the bot has not placed yet on each configured
/// message. Messages that can't be fetched are skipped.
pub async fn sync_reaction_messages(ctx: &Context, data: &Data) {
    for binding in &data.config.reaction_roles {
        let channel = serenity::ChannelId::new(binding.channel_id);
        let message = match channel
            .message(ctx, serenity::MessageId::new(binding.message_id))
            .await
        {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    "Reaction role message {} in {} not found: {e}",
                    binding.message_id,
                    binding.channel_id
                );
                continue;
            }
        };

        let existing: Vec<String> = message
            .reactions
            .iter()
            .filter(|r| r.me)
            .map(|r| r.reaction_type.to_string())
            .collect();

        for emoji in missing_reactions(&existing, &binding.roles) {
            let reaction = match serenity::ReactionType::try_from(emoji.as_str()) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Invalid reaction emoji {emoji:?}: {e}");
                    continue;
                }
            };
            if let Err(e) = message.react(ctx, reaction).await {
                tracing::warn!("Failed to add {emoji} to message {}: {e}", message.id);
            }
        }
    }
}
