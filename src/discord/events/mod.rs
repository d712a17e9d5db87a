// Serenity event glue. Every handler returns `anyhow::Result`; failures are
// logged here so one bad event never takes the bot down.

pub mod anonymous;
pub mod components;
pub mod entry;
pub mod members;
pub mod reactions;
pub mod voice;

use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("{} is connected", data_about_bot.user.name);
            presence::on_ready(ctx);
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = components::handle_interaction(ctx, data, interaction).await {
                tracing::error!("Error handling interaction: {e:#}");
                data.audit
                    .send(&ctx.http, format!("Interaction failed: {e}"))
                    .await;
            }
        }
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = anonymous::handle_direct_message(ctx, data, new_message).await {
                tracing::error!("Error handling direct message: {e:#}");
            }
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            if let Err(e) = voice::handle_voice_state_update(ctx, data, old.as_ref(), new).await {
                tracing::error!("Error handling voice state update: {e:#}");
            }
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Err(e) = reactions::handle_reaction_add(ctx, data, add_reaction).await {
                tracing::error!("Error handling reaction add: {e:#}");
            }
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            if let Err(e) = reactions::handle_reaction_remove(ctx, data, removed_reaction).await {
                tracing::error!("Error handling reaction remove: {e:#}");
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = members::handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error handling member join: {e:#}");
            }
        }
        serenity::FullEvent::GuildMemberRemoval { user, .. } => {
            if let Err(e) = members::handle_member_leave(ctx, data, user).await {
                tracing::error!("Error handling member leave: {e:#}");
            }
        }
        serenity::FullEvent::GuildMemberUpdate {
            old_if_available,
            event,
            ..
        } => {
            if let Err(e) = members::handle_member_update(data, old_if_available.as_ref(), event).await
            {
                tracing::error!("Error handling member update: {e:#}");
            }
        }
        _ => {}
    }

    Ok(())
}
