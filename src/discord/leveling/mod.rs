mod leveling_announcements;

pub use leveling_announcements::{
    announce_level_up, build_progress_bar, is_booster, is_booster_cached,
};
