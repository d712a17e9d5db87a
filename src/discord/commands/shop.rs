// Coin shop panel: nickname colors, custom roles and the XP booster, each
// held for 12 hours. Roles are taken back by `expire_shop_roles`.

use super::{ephemeral, format_number, input_value, reply_ephemeral, Context, Data, Error};
use crate::core::economy::EconomyError;
use crate::core::shop::{
    parse_hex_color, validate_role_name, Purchase, RoleExpiry, ShopError, ShopItem,
};
use crate::discord::boards::refresh_coin_board;
use anyhow::Result;
use chrono::Utc;
use poise::serenity_prelude as serenity;

pub const SHOP_PREFIX: &str = "shop:";
const COLOR_SELECT: &str = "shop:color";
const CUSTOM_ROLE_BUTTON: &str = "shop:custom";
const BOOSTER_BUTTON: &str = "shop:booster";
const CUSTOM_ROLE_MODAL: &str = "shop:custom_form";

const ROLE_NAME: &str = "role_name";
const ROLE_COLOR: &str = "role_color";

/// How many recent messages are checked for an older panel to remove.
const PANEL_SCAN_LIMIT: u8 = 50;

fn panel_message(data: &Data) -> serenity::CreateMessage {
    let mut embed = serenity::CreateEmbed::new()
        .title("🏪 Coin Shop")
        .description(
            "Pick an item below to buy it.\n\n\
            *A nickname color and a custom role do not stack, only the higher role shows.*",
        )
        .color(0xF1C40F);
    for item in ShopItem::ALL {
        embed = embed.field(
            item.name(),
            format!("{} coins (12h)", format_number(item.price())),
            false,
        );
    }

    let mut rows = Vec::new();
    let colors = &data.config.roles.colors;
    if !colors.is_empty() {
        let options = colors
            .keys()
            .map(|label| serenity::CreateSelectMenuOption::new(label, label))
            .collect();
        rows.push(serenity::CreateActionRow::SelectMenu(
            serenity::CreateSelectMenu::new(
                COLOR_SELECT,
                serenity::CreateSelectMenuKind::String { options },
            )
            .placeholder(format!(
                "Nickname color (12h, {} coins)",
                format_number(ShopItem::NickColor.price())
            )),
        ));
    }
    rows.push(serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(CUSTOM_ROLE_BUTTON)
            .label(format!(
                "Custom role (12h, {} coins)",
                format_number(ShopItem::CustomRole.price())
            ))
            .style(serenity::ButtonStyle::Primary),
        serenity::CreateButton::new(BOOSTER_BUTTON)
            .label(format!(
                "2x XP booster (12h, {} coins)",
                format_number(ShopItem::XpBooster.price())
            ))
            .style(serenity::ButtonStyle::Success),
    ]));

    serenity::CreateMessage::new().embed(embed).components(rows)
}

/// Post the shop panel, removing the bot's earlier posts in that channel.
pub async fn post_shop_panel(ctx: &serenity::Context, data: &Data) -> Result<()> {
    let Some(channel_id) = data.config.channels.shop else {
        return Ok(());
    };
    let channel = serenity::ChannelId::new(channel_id);
    let bot_id = ctx.cache.current_user().id;

    let previous = channel
        .messages(ctx, serenity::GetMessages::new().limit(PANEL_SCAN_LIMIT))
        .await?;
    for message in previous.iter().filter(|m| m.author.id == bot_id) {
        if let Err(e) = message.delete(ctx).await {
            tracing::warn!("Could not remove old shop panel {}: {e}", message.id);
        }
    }

    channel.send_message(ctx, panel_message(data)).await?;
    tracing::info!(channel_id, "Shop panel posted");
    Ok(())
}

/// Re-post the coin shop panel
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn shoppanel(ctx: Context<'_>) -> Result<(), Error> {
    if ctx.data().config.channels.shop.is_none() {
        return reply_ephemeral(ctx, "❌ SHOP_CHANNEL_ID is not configured.").await;
    }
    ctx.defer_ephemeral().await?;
    post_shop_panel(ctx.serenity_context(), ctx.data()).await?;
    reply_ephemeral(ctx, "✅ Shop panel posted.").await
}

/// Failures the buyer should read. Store errors go up to the dispatcher.
fn purchase_error(e: ShopError) -> Result<String> {
    match e {
        ShopError::Economy(EconomyError::StoreError(e)) => Err(anyhow::anyhow!("shop purchase: {e}")),
        ShopError::Economy(EconomyError::InsufficientFunds {
            required,
            available,
        }) => Ok(format!(
            "❌ You need {} coins, you have {}.",
            format_number(required),
            format_number(available)
        )),
        other => Ok(format!("❌ {other}")),
    }
}

async fn add_role(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    role_id: u64,
    reason: &str,
) -> serenity::Result<()> {
    ctx.http
        .add_member_role(guild_id, user_id, serenity::RoleId::new(role_id), Some(reason))
        .await
}

/// The role could not be handed out: give the coins back and say so.
async fn refund_failed_purchase(
    ctx: &serenity::Context,
    data: &Data,
    user_id: u64,
    purchase: &Purchase,
    purchase_id: u64,
    cause: serenity::Error,
) -> String {
    tracing::error!(user_id, item = purchase.item.name(), "Shop role grant failed: {cause}");
    if let Err(e) = data.shop.refund(user_id, purchase, purchase_id).await {
        tracing::error!(user_id, "Shop refund failed: {e}");
        data.audit
            .send(
                &ctx.http,
                format!("⚠️ <@{user_id}> paid for {} but was not refunded", purchase.item.name()),
            )
            .await;
        return "❌ Something went wrong, staff has been notified.".to_string();
    }
    "❌ The role could not be granted, your coins were refunded.".to_string()
}

async fn after_purchase(ctx: &serenity::Context, data: &Data, user_id: u64, purchase: &Purchase) {
    if purchase.replayed {
        return;
    }
    tracing::info!(user_id, balance = purchase.balance, "Shop item granted");
    data.audit
        .send(
            &ctx.http,
            format!(
                "🛒 <@{user_id}> spent {} coins on {}",
                format_number(purchase.paid),
                purchase.item.name()
            ),
        )
        .await;
    if let Err(e) = refresh_coin_board(ctx, data, false).await {
        tracing::warn!("Coin board refresh failed: {e:#}");
    }
}

async fn buy_color(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
    guild_id: serenity::GuildId,
) -> Result<String> {
    let label = match &interaction.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.first(),
        _ => None,
    };
    let Some(role_id) = label.and_then(|l| data.config.roles.colors.get(l)).copied() else {
        return Ok("❌ That color is no longer sold.".to_string());
    };

    let user_id = interaction.user.id;
    let purchase_id = interaction.id.get();
    let purchase = match data
        .shop
        .purchase(user_id.get(), ShopItem::NickColor, purchase_id, Utc::now())
        .await
    {
        Ok(p) => p,
        Err(e) => return purchase_error(e),
    };

    let held: Vec<u64> = interaction
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();
    for old in data.config.roles.colors.values().filter(|r| held.contains(*r) && **r != role_id) {
        data.shop.unschedule(user_id.get(), *old);
        if let Err(e) = ctx
            .http
            .remove_member_role(guild_id, user_id, serenity::RoleId::new(*old), Some("Clearing previous color"))
            .await
        {
            tracing::warn!("Could not remove color role {old} from {user_id}: {e}");
        }
    }

    if let Err(e) = add_role(ctx, guild_id, user_id, role_id, "Shop: nickname color").await {
        return Ok(refund_failed_purchase(ctx, data, user_id.get(), &purchase, purchase_id, e).await);
    }
    data.shop.schedule(RoleExpiry {
        guild_id: guild_id.get(),
        user_id: user_id.get(),
        role_id,
        delete_role: false,
        expires_at: purchase.expires_at,
    });
    after_purchase(ctx, data, user_id.get(), &purchase).await;
    Ok(format!(
        "✅ <@&{role_id}> is yours until <t:{}:f>.",
        purchase.expires_at.timestamp()
    ))
}

async fn buy_booster(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
    guild_id: serenity::GuildId,
) -> Result<String> {
    let roles = &data.config.roles;
    let (Some(booster), Some(store)) = (roles.xp_booster, roles.store_access) else {
        return Ok("❌ The XP booster is not available right now.".to_string());
    };

    let user_id = interaction.user.id;
    let purchase_id = interaction.id.get();
    let purchase = match data
        .shop
        .purchase(user_id.get(), ShopItem::XpBooster, purchase_id, Utc::now())
        .await
    {
        Ok(p) => p,
        Err(e) => return purchase_error(e),
    };

    for role_id in [booster, store] {
        if let Err(e) = add_role(ctx, guild_id, user_id, role_id, "Shop: XP booster").await {
            return Ok(refund_failed_purchase(ctx, data, user_id.get(), &purchase, purchase_id, e).await);
        }
        data.shop.schedule(RoleExpiry {
            guild_id: guild_id.get(),
            user_id: user_id.get(),
            role_id,
            delete_role: false,
            expires_at: purchase.expires_at,
        });
    }
    after_purchase(ctx, data, user_id.get(), &purchase).await;
    Ok(format!(
        "✅ Double XP and store access until <t:{}:f>.",
        purchase.expires_at.timestamp()
    ))
}

fn custom_role_modal() -> serenity::CreateModal {
    let input = |label: &str, id: &str, placeholder: &str| {
        serenity::CreateActionRow::InputText(
            serenity::CreateInputText::new(serenity::InputTextStyle::Short, label, id)
                .placeholder(placeholder),
        )
    };
    serenity::CreateModal::new(CUSTOM_ROLE_MODAL, "Custom role (12h)").components(vec![
        input("Role name", ROLE_NAME, "MyRole"),
        input("Hex color", ROLE_COLOR, "#FF00FF"),
    ])
}

/// Shop select menu and buttons.
pub async fn handle_shop_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<()> {
    if interaction.data.custom_id == CUSTOM_ROLE_BUTTON {
        interaction
            .create_response(ctx, serenity::CreateInteractionResponse::Modal(custom_role_modal()))
            .await?;
        return Ok(());
    }
    let Some(guild_id) = interaction.guild_id else {
        return Ok(());
    };

    interaction.defer_ephemeral(ctx).await?;
    let text = match interaction.data.custom_id.as_str() {
        COLOR_SELECT => buy_color(ctx, interaction, data, guild_id).await?,
        BOOSTER_BUTTON => buy_booster(ctx, interaction, data, guild_id).await?,
        _ => return Ok(()),
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

/// Position just above the anchor role, when it is configured and cached.
fn custom_role_position(ctx: &serenity::Context, data: &Data, guild_id: serenity::GuildId) -> Option<u16> {
    let anchor = serenity::RoleId::new(data.config.roles.shop_anchor?);
    let guild = ctx.cache.guild(guild_id)?;
    guild.roles.get(&anchor).map(|r| r.position + 1)
}

/// Custom role form submitted: validate, charge, then create the role.
pub async fn handle_custom_role_submit(
    ctx: &serenity::Context,
    modal: &serenity::ModalInteraction,
    data: &Data,
) -> Result<()> {
    let Some(guild_id) = modal.guild_id else {
        return Ok(());
    };
    if modal.data.custom_id != CUSTOM_ROLE_MODAL {
        return Ok(());
    }
    let rows = &modal.data.components;
    let checked = validate_role_name(&input_value(rows, ROLE_NAME))
        .and_then(|name| Ok((name, parse_hex_color(&input_value(rows, ROLE_COLOR))?)));
    let (name, color) = match checked {
        Ok(v) => v,
        Err(e) => {
            modal.create_response(ctx, ephemeral(format!("❌ {e}"))).await?;
            return Ok(());
        }
    };

    modal.defer_ephemeral(ctx).await?;
    let user_id = modal.user.id;
    let purchase_id = modal.id.get();
    let text = match data
        .shop
        .purchase(user_id.get(), ShopItem::CustomRole, purchase_id, Utc::now())
        .await
    {
        Err(e) => purchase_error(e)?,
        Ok(purchase) => {
            let mut builder = serenity::EditRole::new()
                .name(&name)
                .colour(color)
                .hoist(true)
                .mentionable(false)
                .audit_log_reason("Shop: custom role");
            if let Some(position) = custom_role_position(ctx, data, guild_id) {
                builder = builder.position(position);
            }
            let granted = match guild_id.create_role(ctx, builder).await {
                Ok(role) => add_role(ctx, guild_id, user_id, role.id.get(), "Shop: custom role")
                    .await
                    .map(|_| role),
                Err(e) => Err(e),
            };
            match granted {
                Ok(role) => {
                    data.shop.schedule(RoleExpiry {
                        guild_id: guild_id.get(),
                        user_id: user_id.get(),
                        role_id: role.id.get(),
                        delete_role: true,
                        expires_at: purchase.expires_at,
                    });
                    after_purchase(ctx, data, user_id.get(), &purchase).await;
                    let announce =
                        format!("<@{user_id}> bought the custom role `{name}` for the next 12 hours!");
                    if let Err(e) = modal.channel_id.say(ctx, announce).await {
                        tracing::debug!("Shop announcement failed: {e}");
                    }
                    format!("✅ `{name}` is yours until <t:{}:f>.", purchase.expires_at.timestamp())
                }
                Err(e) => {
                    refund_failed_purchase(ctx, data, user_id.get(), &purchase, purchase_id, e).await
                }
            }
        }
    };

    modal
        .create_followup(
            ctx,
            serenity::CreateInteractionResponseFollowup::new()
                .content(text)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

/// Take back every shop role whose time is up. Runs every minute.
pub async fn expire_shop_roles(ctx: &serenity::Context, data: &Data) {
    for expiry in data.shop.take_due(Utc::now()) {
        let guild_id = serenity::GuildId::new(expiry.guild_id);
        let role_id = serenity::RoleId::new(expiry.role_id);
        let result = if expiry.delete_role {
            guild_id.delete_role(ctx, role_id).await
        } else {
            ctx.http
                .remove_member_role(
                    guild_id,
                    serenity::UserId::new(expiry.user_id),
                    role_id,
                    Some("Shop item expired"),
                )
                .await
        };
        match result {
            Ok(()) => {
                tracing::info!(user_id = expiry.user_id, role_id = expiry.role_id, "Shop role expired");
                data.audit
                    .send(
                        &ctx.http,
                        format!("⌛ Shop role <@&{}> of <@{}> expired", expiry.role_id, expiry.user_id),
                    )
                    .await;
            }
            Err(e) => tracing::warn!(
                user_id = expiry.user_id,
                role_id = expiry.role_id,
                "Could not take back an expired shop role: {e}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_share_the_router_prefix() {
        for id in [COLOR_SELECT, CUSTOM_ROLE_BUTTON, BOOSTER_BUTTON, CUSTOM_ROLE_MODAL] {
            assert!(id.starts_with(SHOP_PREFIX));
        }
    }

    #[test]
    fn buyer_sees_the_shortfall() {
        let text = purchase_error(ShopError::Economy(EconomyError::InsufficientFunds {
            required: 5000,
            available: 1200,
        }))
        .unwrap();
        assert_eq!(text, "❌ You need 5,000 coins, you have 1,200.");
        assert!(purchase_error(ShopError::Economy(EconomyError::StoreError("down".into()))).is_err());
    }
}
