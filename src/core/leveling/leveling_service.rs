// This is the leveling module - it contains the business logic for the XP system.
// It has no Discord-specific code: the Discord layer tells it who earned what
// and whether the member holds the booster role, and it reports level-ups back.
//
// Progress is stored per level: `xp` counts up inside the current level and is
// reset (carrying the remainder) when it reaches `xp_to_next_level(level)`.

use crate::core::timezones::reset_day_start;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A user's level and the XP collected towards the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpProgress {
    pub user_id: u64,
    pub xp: i64,
    pub level: i32,
}

impl XpProgress {
    pub fn empty(user_id: u64) -> Self {
        Self {
            user_id,
            xp: 0,
            level: 0,
        }
    }

    pub fn needed(&self) -> i64 {
        xp_to_next_level(self.level)
    }
}

/// Returned by the service so the Discord layer can announce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub user_id: u64,
    pub old_level: i32,
    pub new_level: i32,
}

/// Where a grant came from. Only used for logging.
#[derive(Debug, Clone, Copy)]
pub enum XpSource {
    DailyBonus,
    Voice { minutes: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XpAction {
    Add,
    Remove,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpChange {
    pub old_xp: i64,
    pub new_xp: i64,
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyBonusOutcome {
    Granted {
        amount: i64,
        level_up: Option<LevelUpEvent>,
    },
    AlreadyClaimed,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Amount must not be negative")]
    InvalidAmount,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait XpStore: Send + Sync {
    /// Current progress, or level 0 with 0 XP for new users.
    async fn get_progress(&self, user_id: u64) -> Result<XpProgress, LevelingError>;

    /// Insert or overwrite a user's progress.
    async fn save_progress(&self, progress: XpProgress) -> Result<(), LevelingError>;

    /// Record the daily bonus claim and save `progress` together, unless a
    /// claim exists at or after `period_start`. Either both are written or
    /// neither is. Returns whether the claim was recorded.
    async fn save_daily_claim(
        &self,
        progress: XpProgress,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<bool, LevelingError>;

    /// 1-based rank ordered by level then XP, None for unranked users.
    async fn rank(&self, user_id: u64) -> Result<Option<u32>, LevelingError>;

    async fn leaderboard(&self, limit: usize) -> Result<Vec<XpProgress>, LevelingError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub const DAILY_BONUS_XP: i64 = 200;
pub const VOICE_XP_PER_MINUTE: i64 = 1;

/// XP required to go from `level` to `level + 1`.
pub fn xp_to_next_level(level: i32) -> i64 {
    100 + i64::from(level) * 20
}

/// Add `amount` and carry the remainder over every threshold it crosses.
fn add_xp(progress: &mut XpProgress, amount: i64) -> Option<LevelUpEvent> {
    let old_level = progress.level;
    progress.xp += amount;
    while progress.xp >= progress.needed() {
        progress.xp -= progress.needed();
        progress.level += 1;
    }
    (progress.level > old_level).then_some(LevelUpEvent {
        user_id: progress.user_id,
        old_level,
        new_level: progress.level,
    })
}

pub struct LevelingService<S: XpStore> {
    store: S,

    /// Serialises read-modify-write cycles on XP rows.
    write_lock: Mutex<()>,

    /// user_id -> when the current voice session started.
    voice_sessions: DashMap<u64, DateTime<Utc>>,
}

impl<S: XpStore> LevelingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            voice_sessions: DashMap::new(),
        }
    }

    /// Add XP, doubling it for boosted members, and carry the remainder over
    /// as many level thresholds as it crosses.
    pub async fn grant(
        &self,
        user_id: u64,
        amount: i64,
        boosted: bool,
        source: XpSource,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        if amount < 0 {
            return Err(LevelingError::InvalidAmount);
        }
        let amount = if boosted { amount * 2 } else { amount };

        let _guard = self.write_lock.lock().await;
        let mut progress = self.store.get_progress(user_id).await?;
        let level_up = add_xp(&mut progress, amount);
        self.store.save_progress(progress).await?;

        tracing::debug!(user_id, amount, ?source, "XP granted");
        Ok(level_up)
    }

    /// The once-per-day XP bonus. The claim and the XP land in one store
    /// write.
    pub async fn claim_daily_bonus(
        &self,
        user_id: u64,
        boosted: bool,
        now: DateTime<Utc>,
    ) -> Result<DailyBonusOutcome, LevelingError> {
        let amount = if boosted { DAILY_BONUS_XP * 2 } else { DAILY_BONUS_XP };

        let _guard = self.write_lock.lock().await;
        let mut progress = self.store.get_progress(user_id).await?;
        let level_up = add_xp(&mut progress, amount);

        let recorded = self
            .store
            .save_daily_claim(progress, now, reset_day_start(now))
            .await?;
        if !recorded {
            return Ok(DailyBonusOutcome::AlreadyClaimed);
        }

        tracing::debug!(user_id, amount, source = ?XpSource::DailyBonus, "XP granted");
        Ok(DailyBonusOutcome::Granted { amount, level_up })
    }

    /// Start timing a voice session. Rejoining keeps the original start.
    pub fn voice_joined(&self, user_id: u64, at: DateTime<Utc>) {
        self.voice_sessions.entry(user_id).or_insert(at);
    }

    /// Close a voice session and return the whole minutes spent, if any.
    pub fn voice_left(&self, user_id: u64, at: DateTime<Utc>) -> Option<i64> {
        let (_, started) = self.voice_sessions.remove(&user_id)?;
        let minutes = (at - started).num_minutes();
        (minutes > 0).then_some(minutes)
    }

    /// Close the session and grant 1 XP per whole minute.
    pub async fn finish_voice_session(
        &self,
        user_id: u64,
        boosted: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<(i64, Option<LevelUpEvent>)>, LevelingError> {
        let Some(minutes) = self.voice_left(user_id, at) else {
            return Ok(None);
        };
        let earned = minutes * VOICE_XP_PER_MINUTE;
        let level_up = self
            .grant(user_id, earned, boosted, XpSource::Voice { minutes })
            .await?;
        Ok(Some((earned, level_up)))
    }

    /// Admin XP adjustment. Levels are left alone and XP never goes negative.
    pub async fn modify(
        &self,
        user_id: u64,
        action: XpAction,
        amount: i64,
    ) -> Result<XpChange, LevelingError> {
        if amount < 0 {
            return Err(LevelingError::InvalidAmount);
        }

        let _guard = self.write_lock.lock().await;
        let mut progress = self.store.get_progress(user_id).await?;
        let old_xp = progress.xp;
        progress.xp = match action {
            XpAction::Add => old_xp + amount,
            XpAction::Remove => (old_xp - amount).max(0),
            XpAction::Set => amount,
        };
        self.store.save_progress(progress).await?;

        Ok(XpChange {
            old_xp,
            new_xp: progress.xp,
            level: progress.level,
        })
    }

    pub async fn progress(&self, user_id: u64) -> Result<XpProgress, LevelingError> {
        self.store.get_progress(user_id).await
    }

    pub async fn rank(&self, user_id: u64) -> Result<Option<u32>, LevelingError> {
        self.store.rank(user_id).await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<XpProgress>, LevelingError> {
        self.store.leaderboard(limit).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::leveling::InMemoryXpStore;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn service() -> LevelingService<InMemoryXpStore> {
        LevelingService::new(InMemoryXpStore::new())
    }

    #[test]
    fn thresholds_grow_by_twenty() {
        assert_eq!(xp_to_next_level(0), 100);
        assert_eq!(xp_to_next_level(1), 120);
        assert_eq!(xp_to_next_level(5), 200);
    }

    #[tokio::test]
    async fn grant_levels_up_and_carries_remainder() {
        let service = service();

        assert_eq!(
            service.grant(1, 90, false, XpSource::DailyBonus).await.unwrap(),
            None
        );

        let level_up = service
            .grant(1, 15, false, XpSource::DailyBonus)
            .await
            .unwrap();
        assert_eq!(
            level_up,
            Some(LevelUpEvent {
                user_id: 1,
                old_level: 0,
                new_level: 1
            })
        );
        let progress = service.progress(1).await.unwrap();
        assert_eq!((progress.level, progress.xp), (1, 5));
    }

    #[tokio::test]
    async fn large_grant_crosses_several_levels() {
        let service = service();
        // 100 + 120 + 140 = 360 to reach level 3
        let level_up = service
            .grant(2, 365, false, XpSource::DailyBonus)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(level_up.new_level, 3);
        assert_eq!(service.progress(2).await.unwrap().xp, 5);
    }

    #[tokio::test]
    async fn booster_role_doubles_xp() {
        let service = service();
        service.grant(3, 30, true, XpSource::DailyBonus).await.unwrap();
        assert_eq!(service.progress(3).await.unwrap().xp, 60);
    }

    #[tokio::test]
    async fn daily_bonus_once_per_day() {
        let service = service();
        let now = utc("2024-03-10T15:00:00Z");

        let first = service.claim_daily_bonus(4, false, now).await.unwrap();
        assert!(matches!(
            first,
            DailyBonusOutcome::Granted { amount: 200, level_up: Some(_) }
        ));

        let second = service
            .claim_daily_bonus(4, false, now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(second, DailyBonusOutcome::AlreadyClaimed);

        let tomorrow = service
            .claim_daily_bonus(4, false, now + Duration::days(1))
            .await
            .unwrap();
        assert!(matches!(tomorrow, DailyBonusOutcome::Granted { .. }));
    }

    /// Fails the first daily write, then behaves like the in-memory store.
    struct FlakyDailyStore {
        inner: InMemoryXpStore,
        failures_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl XpStore for FlakyDailyStore {
        async fn get_progress(&self, user_id: u64) -> Result<XpProgress, LevelingError> {
            self.inner.get_progress(user_id).await
        }

        async fn save_progress(&self, progress: XpProgress) -> Result<(), LevelingError> {
            self.inner.save_progress(progress).await
        }

        async fn save_daily_claim(
            &self,
            progress: XpProgress,
            claimed_at: DateTime<Utc>,
            period_start: DateTime<Utc>,
        ) -> Result<bool, LevelingError> {
            use std::sync::atomic::Ordering;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LevelingError::StorageError("connection reset".to_string()));
            }
            self.inner
                .save_daily_claim(progress, claimed_at, period_start)
                .await
        }

        async fn rank(&self, user_id: u64) -> Result<Option<u32>, LevelingError> {
            self.inner.rank(user_id).await
        }

        async fn leaderboard(&self, limit: usize) -> Result<Vec<XpProgress>, LevelingError> {
            self.inner.leaderboard(limit).await
        }
    }

    #[tokio::test]
    async fn failed_daily_write_keeps_the_claim_available() {
        let service = LevelingService::new(FlakyDailyStore {
            inner: InMemoryXpStore::new(),
            failures_left: std::sync::atomic::AtomicUsize::new(1),
        });
        let now = utc("2024-03-10T15:00:00Z");

        assert!(service.claim_daily_bonus(8, false, now).await.is_err());
        assert_eq!(service.progress(8).await.unwrap(), XpProgress::empty(8));

        let retry = service.claim_daily_bonus(8, false, now).await.unwrap();
        assert!(matches!(retry, DailyBonusOutcome::Granted { amount: 200, .. }));
        assert_eq!(service.progress(8).await.unwrap().level, 1);
    }

    #[tokio::test]
    async fn voice_minutes_become_xp() {
        let service = service();
        let start = utc("2024-03-10T15:00:00Z");

        service.voice_joined(5, start);
        // Moving between channels must not reset the timer.
        service.voice_joined(5, start + Duration::minutes(3));

        let earned = service
            .finish_voice_session(5, false, start + Duration::seconds(7 * 60 + 59))
            .await
            .unwrap();
        assert_eq!(earned.map(|(xp, _)| xp), Some(7));

        // Session is gone now.
        assert_eq!(service.voice_left(5, start + Duration::hours(1)), None);
    }

    #[tokio::test]
    async fn short_voice_session_earns_nothing() {
        let service = service();
        let start = utc("2024-03-10T15:00:00Z");
        service.voice_joined(6, start);
        let earned = service
            .finish_voice_session(6, false, start + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(earned, None);
    }

    #[tokio::test]
    async fn modify_keeps_level_and_clamps() {
        let service = service();
        service.grant(7, 130, false, XpSource::DailyBonus).await.unwrap();

        let change = service.modify(7, XpAction::Remove, 500).await.unwrap();
        assert_eq!(change, XpChange { old_xp: 30, new_xp: 0, level: 1 });

        let change = service.modify(7, XpAction::Set, 42).await.unwrap();
        assert_eq!(change.new_xp, 42);
        assert!(matches!(
            service.modify(7, XpAction::Add, -1).await,
            Err(LevelingError::InvalidAmount)
        ));
    }

    #[tokio::test]
    async fn rank_orders_by_level_then_xp() {
        let service = service();
        service.grant(10, 50, false, XpSource::DailyBonus).await.unwrap();
        service.grant(11, 110, false, XpSource::DailyBonus).await.unwrap();
        service.grant(12, 90, false, XpSource::DailyBonus).await.unwrap();

        assert_eq!(service.rank(11).await.unwrap(), Some(1));
        assert_eq!(service.rank(12).await.unwrap(), Some(2));
        assert_eq!(service.rank(10).await.unwrap(), Some(3));
        assert_eq!(service.rank(99).await.unwrap(), None);

        let top = service.leaderboard(2).await.unwrap();
        assert_eq!(top.iter().map(|p| p.user_id).collect::<Vec<_>>(), vec![11, 12]);
    }

    #[test]
    fn leveling_error_messages_are_descriptive() {
        let storage_error = LevelingError::StorageError("db down".into());
        assert!(storage_error.to_string().contains("db down"));
    }
}
