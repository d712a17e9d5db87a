mod party_finder;

pub use party_finder::{Party, PartyBoard, Tier, PARTY_VOICE_GRACE_MINUTES};
