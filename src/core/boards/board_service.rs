// Boards are bot messages edited in place (leaderboards, claim panels). Their
// message ids survive restarts in the bot_config table.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub const COIN_LEADERBOARD: &str = "coin_leaderboard_message_id";
pub const XP_LEADERBOARD: &str = "xp_leaderboard_message_id";
pub const MMR_LEADERBOARD: &str = "mmr_leaderboard_message_id";
pub const DAILY_COINS_PANEL: &str = "daily_coins_message_id";
pub const DAILY_XP_PANEL: &str = "daily_xp_message_id";

pub const MIN_REFRESH_INTERVAL_SECS: i64 = 300;
pub const INITIAL_BACKOFF_SECS: u64 = 5;
pub const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

#[async_trait]
pub trait BotConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<u64>, BoardError>;
    async fn set(&self, key: &str, value: u64) -> Result<(), BoardError>;
}

pub struct BoardService<S: BotConfigStore> {
    store: S,
}

impl<S: BotConfigStore> BoardService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn message_id(&self, key: &str) -> Result<Option<u64>, BoardError> {
        self.store.get(key).await
    }

    pub async fn remember(&self, key: &str, message_id: u64) -> Result<(), BoardError> {
        tracing::debug!(key, message_id, "Board message stored");
        self.store.set(key, message_id).await
    }
}

/// Throttle and backoff state for one board. Callers keep it behind a
/// `tokio::sync::Mutex` and `try_lock` it so only one refresh runs at a time.
#[derive(Debug)]
pub struct RefreshGate {
    last_update: Option<DateTime<Utc>>,
    last_content: Option<String>,
    backoff_secs: u64,
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self {
            last_update: None,
            last_content: None,
            backoff_secs: INITIAL_BACKOFF_SECS,
        }
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh with `content` should go out at `now`.
    pub fn should_refresh(&self, now: DateTime<Utc>, content: &str, force: bool) -> bool {
        if self.last_content.as_deref() == Some(content) {
            return false;
        }
        if force {
            return true;
        }
        match self.last_update {
            Some(last) => now - last >= Duration::seconds(MIN_REFRESH_INTERVAL_SECS),
            None => true,
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>, content: String) {
        self.last_update = Some(now);
        self.last_content = Some(content);
        self.backoff_secs = INITIAL_BACKOFF_SECS;
    }

    /// How long to wait after a rate limit; doubles up to the cap.
    pub fn record_rate_limited(&mut self) -> std::time::Duration {
        let wait = self.backoff_secs;
        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
        std::time::Duration::from_secs(wait)
    }
}
