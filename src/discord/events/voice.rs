// Voice state glue: temp "studio" channels created from the hub, voice XP
// sessions, and the hourly sweep/stats helpers used by the background tasks.

use crate::core::voice::{stats_renames, temp_channel_name, PresenceCounts};
use crate::discord::boards::refresh_xp_board;
use crate::discord::leveling::{announce_level_up, is_booster_cached};
use crate::discord::Data;
use anyhow::Result;
use chrono::Utc;
use poise::serenity_prelude::{self as serenity, Context};

pub async fn handle_voice_state_update(
    ctx: &Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) -> Result<()> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let Some(member) = new.member.as_ref() else {
        return Ok(());
    };
    if member.user.bot {
        return Ok(());
    }

    let old_channel = old.and_then(|s| s.channel_id);
    let new_channel = new.channel_id;
    if old_channel == new_channel {
        // Mute, deafen or stream toggles.
        return Ok(());
    }

    track_voice_xp(ctx, data, guild_id, member.user.id, old_channel, new_channel).await;

    if let Some(old_channel) = old_channel {
        cleanup_temp_channel(ctx, data, old_channel).await?;
    }
    if new_channel.is_some() && new_channel.map(|c| c.get()) == data.config.channels.temp_voice_hub {
        create_temp_channel(ctx, data, guild_id, member).await?;
    }
    Ok(())
}

async fn track_voice_xp(
    ctx: &Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    old_channel: Option<serenity::ChannelId>,
    new_channel: Option<serenity::ChannelId>,
) {
    let now = Utc::now();
    if old_channel.is_some() {
        let boosted = is_booster_cached(ctx, data, guild_id, user_id);
        match data
            .leveling
            .finish_voice_session(user_id.get(), boosted, now)
            .await
        {
            Ok(Some((earned, level_up))) => {
                tracing::debug!(user_id = user_id.get(), earned, "Voice XP granted");
                if let Some(level_up) = level_up {
                    announce_level_up(ctx, data, &level_up).await;
                }
                if let Err(e) = refresh_xp_board(ctx, data, false).await {
                    tracing::warn!("XP board refresh failed: {e:#}");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Voice XP grant failed for {user_id}: {e}"),
        }
    }
    if new_channel.is_some() {
        data.leveling.voice_joined(user_id.get(), now);
    }
}

/// Members currently connected to `channel_id`, or None when the channel is
/// not in the cache anymore.
pub fn voice_occupancy(ctx: &Context, channel_id: serenity::ChannelId) -> Option<usize> {
    let guild_id = ctx.cache.channel(channel_id).map(|c| c.guild_id)?;
    let guild = ctx.cache.guild(guild_id)?;
    if !guild.channels.contains_key(&channel_id) {
        return None;
    }
    Some(
        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel_id))
            .count(),
    )
}

async fn cleanup_temp_channel(
    ctx: &Context,
    data: &Data,
    channel_id: serenity::ChannelId,
) -> Result<()> {
    let members_left = voice_occupancy(ctx, channel_id).unwrap_or(0);
    if !data
        .temp_voice
        .should_delete_on_leave(channel_id.get(), members_left)
    {
        return Ok(());
    }

    data.temp_voice.forget(channel_id.get());
    if let Err(e) = channel_id.delete(ctx).await {
        tracing::warn!("Failed to delete empty temp channel {channel_id}: {e}");
    } else {
        tracing::info!(channel_id = channel_id.get(), "Temp voice channel deleted");
    }
    Ok(())
}

fn temp_channel_overwrites(
    guild_id: serenity::GuildId,
    owner: serenity::UserId,
    view_role: Option<u64>,
) -> Vec<serenity::PermissionOverwrite> {
    let everyone = serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id.get()));
    let join = serenity::Permissions::VIEW_CHANNEL | serenity::Permissions::CONNECT;

    let mut overwrites = match view_role {
        Some(role) => vec![
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::empty(),
                deny: serenity::Permissions::VIEW_CHANNEL,
                kind: everyone,
            },
            serenity::PermissionOverwrite {
                allow: join,
                deny: serenity::Permissions::empty(),
                kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(role)),
            },
        ],
        None => vec![serenity::PermissionOverwrite {
            allow: serenity::Permissions::CONNECT,
            deny: serenity::Permissions::empty(),
            kind: everyone,
        }],
    };
    overwrites.push(serenity::PermissionOverwrite {
        allow: join | serenity::Permissions::MANAGE_CHANNELS | serenity::Permissions::MOVE_MEMBERS,
        deny: serenity::Permissions::empty(),
        kind: serenity::PermissionOverwriteType::Member(owner),
    });
    overwrites
}

async fn create_temp_channel(
    ctx: &Context,
    data: &Data,
    guild_id: serenity::GuildId,
    member: &serenity::Member,
) -> Result<()> {
    let category = data
        .config
        .channels
        .temp_voice_hub
        .and_then(|hub| ctx.cache.channel(serenity::ChannelId::new(hub)).and_then(|c| c.parent_id));

    let mut builder = serenity::CreateChannel::new(temp_channel_name(member.display_name()))
        .kind(serenity::ChannelType::Voice)
        .permissions(temp_channel_overwrites(
            guild_id,
            member.user.id,
            data.config.roles.temp_voice_view,
        ));
    if let Some(category) = category {
        builder = builder.category(category);
    }

    let channel = guild_id.create_channel(ctx, builder).await?;
    data.temp_voice
        .register(channel.id.get(), member.user.id.get(), Utc::now());
    tracing::info!(
        channel_id = channel.id.get(),
        owner_id = member.user.id.get(),
        "Temp voice channel created"
    );

    if let Err(e) = guild_id.move_member(ctx, member.user.id, channel.id).await {
        tracing::warn!("Could not move {} into their studio: {e}", member.user.id);
    }
    Ok(())
}

/// Delete registered channels that sat empty past their max age and forget
/// the ones that vanished.
pub async fn sweep_temp_channels(ctx: &Context, data: &Data) {
    let plan = data
        .temp_voice
        .plan_sweep(Utc::now(), |id| voice_occupancy(ctx, serenity::ChannelId::new(id)));

    for id in plan.forget {
        data.temp_voice.forget(id);
    }
    for id in plan.delete {
        data.temp_voice.forget(id);
        if let Err(e) = serenity::ChannelId::new(id).delete(ctx).await {
            tracing::warn!("Sweep failed to delete temp channel {id}: {e}");
        }
    }
    tracing::debug!(remaining = data.temp_voice.len(), "Temp voice sweep done");
}

fn presence_counts(guild: &serenity::Guild) -> PresenceCounts {
    let mut counts = PresenceCounts {
        members: guild.member_count as usize,
        ..Default::default()
    };
    for presence in guild.presences.values() {
        match presence.status {
            serenity::OnlineStatus::Online => counts.online += 1,
            serenity::OnlineStatus::Idle => counts.idle += 1,
            serenity::OnlineStatus::DoNotDisturb => counts.dnd += 1,
            _ => {}
        }
    }
    counts
}

/// Rename every stats channel (found by its emoji prefix) in every cached
/// guild with the current presence counts.
pub async fn update_stats_channels(ctx: &Context) {
    let renames: Vec<(u64, String)> = ctx
        .cache
        .guilds()
        .into_iter()
        .filter_map(|guild_id| {
            let guild = ctx.cache.guild(guild_id)?;
            let counts = presence_counts(&guild);
            Some(stats_renames(
                guild.channels.values().map(|c| (c.id.get(), c.name.as_str())),
                &counts,
            ))
        })
        .flatten()
        .collect();

    for (channel_id, name) in renames {
        let channel_id = serenity::ChannelId::new(channel_id);
        if let Err(e) = channel_id
            .edit(ctx, serenity::EditChannel::new().name(name))
            .await
        {
            tracing::warn!("Stats channel rename failed for {channel_id}: {e}");
        }
    }
}
