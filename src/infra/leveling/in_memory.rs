// In-memory implementation of XpStore, used by the leveling tests.
//
// DashMap lets concurrent tasks touch different users without a global Mutex.

use crate::core::leveling::{LevelingError, XpProgress, XpStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryXpStore {
    progress: DashMap<u64, XpProgress>,
    daily_claims: DashMap<u64, DateTime<Utc>>,
}

impl InMemoryXpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ordered(&self) -> Vec<XpProgress> {
        let mut rows: Vec<XpProgress> = self.progress.iter().map(|e| *e.value()).collect();
        rows.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(b.xp.cmp(&a.xp))
                .then(a.user_id.cmp(&b.user_id))
        });
        rows
    }
}

#[async_trait]
impl XpStore for InMemoryXpStore {
    async fn get_progress(&self, user_id: u64) -> Result<XpProgress, LevelingError> {
        Ok(self
            .progress
            .get(&user_id)
            .map(|p| *p)
            .unwrap_or_else(|| XpProgress::empty(user_id)))
    }

    async fn save_progress(&self, progress: XpProgress) -> Result<(), LevelingError> {
        self.progress.insert(progress.user_id, progress);
        Ok(())
    }

    async fn save_daily_claim(
        &self,
        progress: XpProgress,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<bool, LevelingError> {
        let mut entry = self
            .daily_claims
            .entry(progress.user_id)
            .or_insert(DateTime::<Utc>::MIN_UTC);
        if *entry >= period_start {
            return Ok(false);
        }
        *entry = claimed_at;
        // Still holding the claim entry, so no other claim can slip in.
        self.progress.insert(progress.user_id, progress);
        Ok(true)
    }

    async fn rank(&self, user_id: u64) -> Result<Option<u32>, LevelingError> {
        Ok(self
            .ordered()
            .iter()
            .position(|p| p.user_id == user_id)
            .map(|i| i as u32 + 1))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<XpProgress>, LevelingError> {
        Ok(self.ordered().into_iter().take(limit).collect())
    }
}
