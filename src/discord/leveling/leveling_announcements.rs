use crate::core::leveling::{xp_to_next_level, LevelUpEvent};
use crate::discord::Data;
use poise::serenity_prelude::{self as serenity, builder::CreateMessage};
use rand::seq::SliceRandom;

/// Members holding the booster role earn double XP.
pub fn is_booster(data: &Data, roles: &[serenity::RoleId]) -> bool {
    data.config
        .roles
        .xp_booster
        .is_some_and(|booster| roles.iter().any(|r| r.get() == booster))
}

/// Booster check for event handlers that only have ids, via the cache.
pub fn is_booster_cached(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> bool {
    ctx.cache
        .guild(guild_id)
        .and_then(|g| g.members.get(&user_id).map(|m| is_booster(data, &m.roles)))
        .unwrap_or(false)
}

/// Post a level-up embed to the LEVELUP channel. Failures are logged only.
pub async fn announce_level_up(ctx: &serenity::Context, data: &Data, level_up: &LevelUpEvent) {
    tracing::info!(
        user_id = level_up.user_id,
        old_level = level_up.old_level,
        new_level = level_up.new_level,
        "User leveled up"
    );

    let Some(channel_id) = data.config.channels.levelup else {
        return;
    };

    let embed = serenity::CreateEmbed::new()
        .title("Level Up!")
        .description(format!(
            "<@{}> reached level {}!",
            level_up.user_id, level_up.new_level
        ))
        .color(level_color(level_up.new_level))
        .field(
            "Next level",
            format!("{} XP to go", xp_to_next_level(level_up.new_level)),
            true,
        )
        .footer(serenity::CreateEmbedFooter::new(random_flavor_line()));

    if let Err(e) = serenity::ChannelId::new(channel_id)
        .send_message(ctx, CreateMessage::new().embed(embed))
        .await
    {
        tracing::warn!("Failed to send level-up embed: {e}");
    }
}

fn level_color(level: i32) -> serenity::Colour {
    if level >= 50 {
        serenity::Colour::DARK_PURPLE
    } else if level >= 25 {
        serenity::Colour::ORANGE
    } else if level >= 10 {
        serenity::Colour::GOLD
    } else if level >= 5 {
        serenity::Colour::BLURPLE
    } else {
        serenity::Colour::LIGHT_GREY
    }
}

pub fn build_progress_bar(progress: f64, length: usize) -> String {
    let clamped = progress.clamp(0.0, 1.0);
    let mut filled = (clamped * length as f64).round() as usize;
    if clamped > 0.0 && filled == 0 {
        filled = 1;
    }
    filled = filled.min(length);
    let bar = "▰".repeat(filled) + &"▱".repeat(length - filled);
    format!("{} ({}%)", bar, (clamped * 100.0).round() as u32)
}

fn random_flavor_line() -> &'static str {
    const FLAVOR_LINES: [&str; 4] = [
        "Keep the streak going!",
        "See you in the voice channels.",
        "Another level, another flex.",
        "That XP bar never stood a chance.",
    ];

    FLAVOR_LINES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FLAVOR_LINES[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_shows_at_least_one_segment() {
        assert_eq!(build_progress_bar(0.01, 10), "▰▱▱▱▱▱▱▱▱▱ (1%)");
        assert_eq!(build_progress_bar(0.0, 4), "▱▱▱▱ (0%)");
        assert_eq!(build_progress_bar(1.5, 4), "▰▰▰▰ (100%)");
    }

    #[test]
    fn colours_step_up_with_level() {
        assert_eq!(level_color(1), serenity::Colour::LIGHT_GREY);
        assert_eq!(level_color(12), serenity::Colour::GOLD);
        assert_eq!(level_color(60), serenity::Colour::DARK_PURPLE);
    }
}
