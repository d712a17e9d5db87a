// Temporary voice channel bookkeeping and the stats channel names.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Empty temp channels older than this are removed by the hourly sweep.
pub const TEMP_CHANNEL_MAX_IDLE_MINUTES: i64 = 60;

pub const PRESENCE_STATS_PREFIX: &str = "🟢";
pub const BANNER_STATS_PREFIX: &str = "🎗";
pub const MEMBER_STATS_PREFIX: &str = "👥";
pub const BANNER_STATS_NAME: &str = "🎗️ discord.gg/ourstudio";

pub fn temp_channel_name(display_name: &str) -> String {
    format!("🔊┆{display_name}'s Studio")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempChannel {
    pub owner_id: u64,
    pub created_at: DateTime<Utc>,
}

/// What the sweep decided for the registered channels.
#[derive(Debug, Default, PartialEq)]
pub struct SweepPlan {
    pub delete: Vec<u64>,
    pub forget: Vec<u64>,
}

#[derive(Default)]
pub struct TempVoiceRegistry {
    channels: DashMap<u64, TempChannel>,
}

impl TempVoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel_id: u64, owner_id: u64, at: DateTime<Utc>) {
        self.channels.insert(
            channel_id,
            TempChannel {
                owner_id,
                created_at: at,
            },
        );
    }

    pub fn get(&self, channel_id: u64) -> Option<TempChannel> {
        self.channels.get(&channel_id).map(|c| *c)
    }

    pub fn forget(&self, channel_id: u64) {
        self.channels.remove(&channel_id);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// A registered channel is deleted as soon as the last member leaves.
    pub fn should_delete_on_leave(&self, channel_id: u64, members_left: usize) -> bool {
        members_left == 0 && self.channels.contains_key(&channel_id)
    }

    /// Decide the hourly sweep. `occupancy` returns the member count of a
    /// channel, or None when the channel no longer exists.
    pub fn plan_sweep(
        &self,
        now: DateTime<Utc>,
        occupancy: impl Fn(u64) -> Option<usize>,
    ) -> SweepPlan {
        let mut plan = SweepPlan::default();
        let max_age = Duration::minutes(TEMP_CHANNEL_MAX_IDLE_MINUTES);

        for entry in self.channels.iter() {
            let channel_id = *entry.key();
            match occupancy(channel_id) {
                None => plan.forget.push(channel_id),
                Some(0) if now - entry.created_at >= max_age => plan.delete.push(channel_id),
                Some(_) => {}
            }
        }

        plan.delete.sort_unstable();
        plan.forget.sort_unstable();
        plan
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresenceCounts {
    pub online: usize,
    pub idle: usize,
    pub dnd: usize,
    pub members: usize,
}

pub fn presence_stats_name(counts: &PresenceCounts) -> String {
    format!(
        "{PRESENCE_STATS_PREFIX} {}    🌙 {}    ⛔ {}",
        counts.online, counts.idle, counts.dnd
    )
}

pub fn member_stats_name(counts: &PresenceCounts) -> String {
    format!("{MEMBER_STATS_PREFIX} Users: {}", counts.members)
}

/// New name for a stats channel, or None when it is not a stats channel.
pub fn stats_channel_name(current: &str, counts: &PresenceCounts) -> Option<String> {
    if current.starts_with(PRESENCE_STATS_PREFIX) {
        Some(presence_stats_name(counts))
    } else if current.starts_with(BANNER_STATS_PREFIX) {
        Some(BANNER_STATS_NAME.to_string())
    } else if current.starts_with(MEMBER_STATS_PREFIX) {
        Some(member_stats_name(counts))
    } else {
        None
    }
}

/// Renames for every stats channel among `channels` whose name is out of date.
pub fn stats_renames<'a>(
    channels: impl IntoIterator<Item = (u64, &'a str)>,
    counts: &PresenceCounts,
) -> Vec<(u64, String)> {
    channels
        .into_iter()
        .filter_map(|(id, name)| {
            stats_channel_name(name, counts)
                .filter(|new_name| new_name != name)
                .map(|new_name| (id, new_name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn names() {
        assert_eq!(temp_channel_name("Neon"), "🔊┆Neon's Studio");

        let counts = PresenceCounts {
            online: 12,
            idle: 3,
            dnd: 1,
            members: 240,
        };
        assert_eq!(presence_stats_name(&counts), "🟢 12    🌙 3    ⛔ 1");
        assert_eq!(
            stats_channel_name("👥 Users: 239", &counts).as_deref(),
            Some("👥 Users: 240")
        );
        assert_eq!(
            stats_channel_name("🎗 old", &counts).as_deref(),
            Some(BANNER_STATS_NAME)
        );
        assert_eq!(stats_channel_name("General", &counts), None);
    }

    #[test]
    fn every_prefixed_channel_is_renamed() {
        let counts = PresenceCounts {
            online: 4,
            idle: 0,
            dnd: 2,
            members: 90,
        };
        let channels = [
            (1, "🟢 1    🌙 1    ⛔ 1"),
            (2, "general"),
            (3, "👥 Users: 88"),
            (4, BANNER_STATS_NAME),
            (5, "🎗 typo"),
            (6, "👥 Users: 90"),
        ];

        assert_eq!(
            stats_renames(channels, &counts),
            vec![
                (1, "🟢 4    🌙 0    ⛔ 2".to_string()),
                (3, "👥 Users: 90".to_string()),
                (5, BANNER_STATS_NAME.to_string()),
            ]
        );
    }

    #[test]
    fn leaving_the_last_member_deletes_registered_channels_only() {
        let registry = TempVoiceRegistry::new();
        registry.register(5, 1, Utc::now());

        assert!(registry.should_delete_on_leave(5, 0));
        assert!(!registry.should_delete_on_leave(5, 2));
        assert!(!registry.should_delete_on_leave(6, 0));
    }

    #[test]
    fn sweep_deletes_old_empty_channels_and_forgets_vanished_ones() {
        let registry = TempVoiceRegistry::new();
        let now = utc("2024-06-01T12:00:00Z");
        registry.register(1, 10, now - Duration::minutes(90)); // old, empty
        registry.register(2, 10, now - Duration::minutes(10)); // young, empty
        registry.register(3, 10, now - Duration::minutes(90)); // old, occupied
        registry.register(4, 10, now - Duration::minutes(90)); // gone

        let plan = registry.plan_sweep(now, |id| match id {
            1 | 2 => Some(0),
            3 => Some(4),
            _ => None,
        });

        assert_eq!(plan.delete, vec![1]);
        assert_eq!(plan.forget, vec![4]);
    }
}
