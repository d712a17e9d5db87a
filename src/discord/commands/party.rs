// Party finder: `/party` opens a voice channel for the leader and announces
// the party with pings for every tier in range. Join and leave go through the
// buttons on the announcement.

use super::{ephemeral, reply_ephemeral, Context, Data, Error};
use crate::core::party::{Party, Tier, PARTY_VOICE_GRACE_MINUTES};
use crate::core::voice::temp_channel_name;
use crate::discord::events::voice::voice_occupancy;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::collections::BTreeMap;
use std::time::Duration;

pub const PARTY_PREFIX: &str = "party:";
const JOIN: &str = "party:join";
const LEAVE: &str = "party:leave";

/// Voice invites stay valid for a day.
const INVITE_MAX_AGE_SECS: u32 = 86_400;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum PartySizeChoice {
    #[name = "2 players"]
    Two,
    #[name = "3 players"]
    Three,
    #[name = "5 players"]
    Five,
}

impl PartySizeChoice {
    fn players(self) -> usize {
        match self {
            PartySizeChoice::Two => 2,
            PartySizeChoice::Three => 3,
            PartySizeChoice::Five => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum TierChoice {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Ascendant,
    Immortal,
    Radiant,
}

impl From<TierChoice> for Tier {
    fn from(choice: TierChoice) -> Self {
        match choice {
            TierChoice::Iron => Tier::Iron,
            TierChoice::Bronze => Tier::Bronze,
            TierChoice::Silver => Tier::Silver,
            TierChoice::Gold => Tier::Gold,
            TierChoice::Platinum => Tier::Platinum,
            TierChoice::Diamond => Tier::Diamond,
            TierChoice::Ascendant => Tier::Ascendant,
            TierChoice::Immortal => Tier::Immortal,
            TierChoice::Radiant => Tier::Radiant,
        }
    }
}

fn party_embed(party: &Party) -> serenity::CreateEmbed {
    let status = match party.remaining() {
        0 => "**The party is full!**".to_string(),
        n => format!("**Looking for {n} more**"),
    };
    let players = party
        .members()
        .iter()
        .enumerate()
        .map(|(i, id)| format!("{}. <@{id}>", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    let mut embed = serenity::CreateEmbed::new()
        .title(format!(
            "🎮 Valorant party {}/{}",
            party.members().len(),
            party.size
        ))
        .description(format!(
            "{status}\n\nTiers: {} to {}",
            party.min_tier.name(),
            party.max_tier.name()
        ))
        .field("Players", players, false)
        .color(0x3498DB)
        .timestamp(serenity::Timestamp::now());
    if let Some(channel) = party.voice_channel {
        embed = embed.field("Voice", format!("<#{channel}>"), true);
    }
    embed
}

fn party_buttons(party: &Party) -> Vec<serenity::CreateActionRow> {
    let mut buttons = vec![
        serenity::CreateButton::new(JOIN)
            .label("Join party")
            .style(serenity::ButtonStyle::Primary)
            .disabled(party.is_full()),
        serenity::CreateButton::new(LEAVE)
            .label("Leave party")
            .style(serenity::ButtonStyle::Danger),
    ];
    if let Some(url) = &party.voice_invite {
        buttons.push(serenity::CreateButton::new_link(url).label("🔗 Join voice"));
    }
    vec![serenity::CreateActionRow::Buttons(buttons)]
}

/// Role pings for the announcement: the game role, then one per tier in range.
fn party_pings(party: &Party, game_role: Option<u64>, tier_roles: &BTreeMap<String, u64>) -> String {
    let tiers = party
        .tiers()
        .into_iter()
        .filter_map(|t| tier_roles.get(t.name()).copied());
    game_role
        .into_iter()
        .chain(tiers)
        .map(|role| format!("<@&{role}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Create the leader's voice channel in the party category. Failures only
/// cost the party its voice channel.
async fn open_party_voice(
    ctx: Context<'_>,
    data: &Data,
    party: &mut Party,
) -> Result<(), Error> {
    let (Some(category), Some(guild_id)) = (data.config.channels.party_category, ctx.guild_id())
    else {
        return Ok(());
    };
    let name = match ctx.author_member().await {
        Some(member) => temp_channel_name(member.display_name()),
        None => temp_channel_name(&ctx.author().name),
    };
    let channel = guild_id
        .create_channel(
            ctx,
            serenity::CreateChannel::new(name)
                .kind(serenity::ChannelType::Voice)
                .category(serenity::ChannelId::new(category)),
        )
        .await?;
    data.temp_voice
        .register(channel.id.get(), ctx.author().id.get(), Utc::now());
    party.voice_channel = Some(channel.id.get());

    match channel
        .create_invite(
            ctx,
            serenity::CreateInvite::new()
                .max_age(INVITE_MAX_AGE_SECS)
                .max_uses(0)
                .unique(true),
        )
        .await
    {
        Ok(invite) => party.voice_invite = Some(invite.url()),
        Err(e) => tracing::warn!("Could not create a party invite: {e}"),
    }

    let sctx = ctx.serenity_context().clone();
    let data = data.clone();
    let channel_id = channel.id;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(PARTY_VOICE_GRACE_MINUTES * 60)).await;
        if voice_occupancy(&sctx, channel_id) == Some(0) {
            data.temp_voice.forget(channel_id.get());
            match channel_id.delete(&sctx).await {
                Ok(_) => tracing::info!(channel_id = channel_id.get(), "Unused party voice removed"),
                Err(e) => tracing::warn!("Failed to delete unused party voice {channel_id}: {e}"),
            }
        }
    });
    Ok(())
}

/// Find players for a Valorant party
#[poise::command(slash_command, guild_only)]
pub async fn party(
    ctx: Context<'_>,
    #[description = "Party size"] size: PartySizeChoice,
    #[description = "Lowest tier"] min_tier: TierChoice,
    #[description = "Highest tier"] max_tier: TierChoice,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(party_channel) = data.config.channels.party else {
        return reply_ephemeral(ctx, "❌ PARTY_CHANNEL_ID is not configured.").await;
    };
    ctx.defer_ephemeral().await?;

    let mut party = Party::new(
        ctx.author().id.get(),
        size.players(),
        min_tier.into(),
        max_tier.into(),
        Utc::now(),
    )?;
    if let Err(e) = open_party_voice(ctx, data, &mut party).await {
        tracing::warn!("Party voice channel failed: {e}");
    }

    let message = serenity::CreateMessage::new()
        .content(party_pings(&party, data.config.roles.valorant, &data.config.roles.tiers))
        .embed(party_embed(&party))
        .components(party_buttons(&party))
        .allowed_mentions(serenity::CreateAllowedMentions::new().all_roles(true));
    let posted = serenity::ChannelId::new(party_channel)
        .send_message(ctx, message)
        .await?;

    tracing::info!(
        leader = party.leader,
        size = party.size,
        message_id = posted.id.get(),
        "Party posted"
    );
    data.parties.publish(posted.id.get(), party);
    reply_ephemeral(ctx, format!("✅ Your party is up in <#{party_channel}>.")).await
}

/// Join / leave buttons on a party announcement.
pub async fn handle_party_button(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> anyhow::Result<()> {
    let message_id = interaction.message.id.get();
    let user_id = interaction.user.id.get();
    let result = match interaction.data.custom_id.as_str() {
        JOIN => data.parties.join(message_id, user_id),
        LEAVE => data.parties.leave(message_id, user_id),
        _ => return Ok(()),
    };

    let response = match result {
        Ok(party) => serenity::CreateInteractionResponse::UpdateMessage(
            serenity::CreateInteractionResponseMessage::new()
                .embed(party_embed(&party))
                .components(party_buttons(&party)),
        ),
        Err(e) => ephemeral(format!("⚠️ {e}")),
    };
    interaction.create_response(ctx, response).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_map_to_player_counts() {
        assert_eq!(PartySizeChoice::Two.players(), 2);
        assert_eq!(PartySizeChoice::Three.players(), 3);
        assert_eq!(PartySizeChoice::Five.players(), 5);
    }

    #[test]
    fn pings_cover_the_game_role_and_tiers_in_range() {
        let party = Party::new(1, 5, Tier::Gold, Tier::Silver, Utc::now()).unwrap();
        let tiers = BTreeMap::from([
            ("Silver".to_string(), 12),
            ("Gold".to_string(), 13),
            ("Diamond".to_string(), 15),
        ]);
        assert_eq!(party_pings(&party, Some(9), &tiers), "<@&9> <@&12> <@&13>");
        assert_eq!(party_pings(&party, None, &BTreeMap::new()), "");
    }

    #[test]
    fn button_ids_share_the_router_prefix() {
        assert!(JOIN.starts_with(PARTY_PREFIX));
        assert!(LEAVE.starts_with(PARTY_PREFIX));
    }
}
