// Entry flow: a persistent button opens the entry modal; submitting it logs
// the answers and lifts the Unverified role.

use crate::core::entry::EntryForm;
use crate::discord::commands::{input_value, reply_ephemeral};
use crate::discord::{Context as CommandContext, Data, Error};
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

pub const ENTRY_BUTTON_PREFIX: &str = "entry:";
pub const ENTRY_OPEN_BUTTON: &str = "entry:open";
pub const ENTRY_MODAL: &str = "entry:form";

const RIOT_ID: &str = "riot_id";
const BIRTH_YEAR: &str = "birth_year";
const CURRENT_TIER: &str = "current_tier";
const PEAK_TIER: &str = "peak_tier";
const INVITER: &str = "inviter";

/// How many recent messages are checked for an older panel to remove.
const PANEL_SCAN_LIMIT: u8 = 50;

fn panel_message() -> serenity::CreateMessage {
    let embed = serenity::CreateEmbed::new()
        .title("🚪 Welcome! Let us know who you are")
        .description(
            "Press **Enter** and fill in the short form to unlock the rest of the server.",
        )
        .color(0x5865F2);
    let button = serenity::CreateButton::new(ENTRY_OPEN_BUTTON)
        .label("Enter")
        .emoji('🚪')
        .style(serenity::ButtonStyle::Success);
    serenity::CreateMessage::new()
        .embed(embed)
        .components(vec![serenity::CreateActionRow::Buttons(vec![button])])
}

/// Post the entry panel, removing the bot's earlier posts in that channel.
pub async fn post_entry_panel(ctx: &Context, data: &Data) -> Result<()> {
    let Some(channel_id) = data.config.channels.entry_button else {
        return Ok(());
    };
    let channel = serenity::ChannelId::new(channel_id);
    let bot_id = ctx.cache.current_user().id;

    let previous = channel
        .messages(ctx, serenity::GetMessages::new().limit(PANEL_SCAN_LIMIT))
        .await?;
    for message in previous.iter().filter(|m| m.author.id == bot_id) {
        if let Err(e) = message.delete(ctx).await {
            tracing::warn!("Could not remove old entry panel {}: {e}", message.id);
        }
    }

    channel.send_message(ctx, panel_message()).await?;
    tracing::info!(channel_id, "Entry panel posted");
    Ok(())
}

/// Re-post the entry panel
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn entrypanel(ctx: CommandContext<'_>) -> Result<(), Error> {
    if ctx.data().config.channels.entry_button.is_none() {
        return reply_ephemeral(ctx, "❌ ENTRY_BUTTON_CHANNEL_ID is not configured.").await;
    }
    ctx.defer_ephemeral().await?;
    post_entry_panel(ctx.serenity_context(), ctx.data()).await?;
    reply_ephemeral(ctx, "✅ Entry panel posted.").await
}

fn input(label: &str, id: &str, placeholder: &str, required: bool) -> serenity::CreateActionRow {
    serenity::CreateActionRow::InputText(
        serenity::CreateInputText::new(serenity::InputTextStyle::Short, label, id)
            .placeholder(placeholder)
            .required(required),
    )
}

/// Answer the entry button with the form.
pub async fn open_entry_modal(
    ctx: &Context,
    interaction: &serenity::ComponentInteraction,
) -> Result<()> {
    let modal = serenity::CreateModal::new(ENTRY_MODAL, "Entry form").components(vec![
        input("Riot ID", RIOT_ID, "Name#TAG", true),
        input("Birth year", BIRTH_YEAR, "e.g. 2001", true),
        input("Current tier", CURRENT_TIER, "e.g. Gold 2", true),
        input("Peak tier", PEAK_TIER, "e.g. Platinum 1", true),
        input("Who invited you?", INVITER, "Name or Discord ID", false),
    ]);
    interaction
        .create_response(ctx, serenity::CreateInteractionResponse::Modal(modal))
        .await?;
    Ok(())
}

/// Pull the form answers out of the submitted modal rows.
fn read_form(rows: &[serenity::ActionRow]) -> EntryForm {
    EntryForm {
        riot_id: input_value(rows, RIOT_ID),
        birth_year: input_value(rows, BIRTH_YEAR),
        current_tier: input_value(rows, CURRENT_TIER),
        peak_tier: input_value(rows, PEAK_TIER),
        inviter: input_value(rows, INVITER),
    }
}

fn entry_log_embed(user: &serenity::User, form: &EntryForm) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("📝 New entry")
        .description(format!("<@{}> ({})", user.id, user.name))
        .field("Riot ID", &form.riot_id, true)
        .field("Birth year", &form.birth_year, true)
        .field("Current tier", &form.current_tier, true)
        .field("Peak tier", &form.peak_tier, true)
        .field("Invited by", form.inviter_display(), true)
        .thumbnail(user.face())
        .color(0x3498DB)
        .timestamp(serenity::Timestamp::now())
}

pub async fn handle_entry_submit(
    ctx: &Context,
    modal: &serenity::ModalInteraction,
    data: &Data,
) -> Result<()> {
    let form = read_form(&modal.data.components);
    let user = &modal.user;

    if let Some(channel) = data.config.channels.entry_log {
        serenity::ChannelId::new(channel)
            .send_message(
                ctx,
                serenity::CreateMessage::new().embed(entry_log_embed(user, &form)),
            )
            .await?;
    }

    if let (Some(guild_id), Some(role)) = (modal.guild_id, data.config.roles.unverified) {
        if let Err(e) = ctx
            .http
            .remove_member_role(
                guild_id,
                user.id,
                serenity::RoleId::new(role),
                Some("Entry form submitted"),
            )
            .await
        {
            tracing::warn!("Could not remove Unverified from {}: {e}", user.id);
        }
    }

    modal
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content("✅ Thanks! You now have access to the server.")
                    .ephemeral(true),
            ),
        )
        .await?;
    tracing::info!(user_id = user.id.get(), riot_id = %form.riot_id, "Entry form submitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_have_distinct_ids() {
        let ids = [RIOT_ID, BIRTH_YEAR, CURRENT_TIER, PEAK_TIER, INVITER];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn custom_ids_share_the_router_prefix() {
        assert!(ENTRY_OPEN_BUTTON.starts_with(ENTRY_BUTTON_PREFIX));
        assert!(ENTRY_MODAL.starts_with(ENTRY_BUTTON_PREFIX));
    }

    #[test]
    fn empty_rows_give_an_empty_form() {
        let form = read_form(&[]);
        assert_eq!(form.riot_id, "");
        assert_eq!(form.inviter_display(), "-");
    }
}
