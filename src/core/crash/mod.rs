pub mod crash_round;
mod crash_service;

pub use crash_round::{CrashError, CrashResult, LOBBY_SECONDS, TICK_SECONDS};
pub use crash_service::{CrashGameError, CrashService, JoinReceipt, RoundSnapshot, RoundSummary};
