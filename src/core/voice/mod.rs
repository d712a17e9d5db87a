mod voice_service;

pub use voice_service::{
    stats_renames, temp_channel_name, PresenceCounts, SweepPlan, TempVoiceRegistry,
};
