use crate::core::leveling::{LevelingError, XpProgress, XpStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PostgresXpStore {
    pool: PgPool,
}

fn store_err(e: sqlx::Error) -> LevelingError {
    LevelingError::StorageError(e.to_string())
}

fn row_to_progress(row: &sqlx::postgres::PgRow) -> XpProgress {
    XpProgress {
        user_id: row.get::<i64, _>("user_id") as u64,
        xp: row.get::<i64, _>("xp"),
        level: row.get::<i32, _>("level"),
    }
}

impl PostgresXpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS xp (
                user_id BIGINT PRIMARY KEY,
                xp BIGINT NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_claim (
                user_id BIGINT PRIMARY KEY,
                last_claim TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl XpStore for PostgresXpStore {
    async fn get_progress(&self, user_id: u64) -> Result<XpProgress, LevelingError> {
        let row = sqlx::query("SELECT user_id, xp, level FROM xp WHERE user_id = $1")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(row
            .as_ref()
            .map(row_to_progress)
            .unwrap_or_else(|| XpProgress::empty(user_id)))
    }

    async fn save_progress(&self, progress: XpProgress) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO xp (user_id, xp, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
              SET xp = EXCLUDED.xp,
                  level = EXCLUDED.level
            "#,
        )
        .bind(progress.user_id as i64)
        .bind(progress.xp)
        .bind(progress.level)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn save_daily_claim(
        &self,
        progress: XpProgress,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<bool, LevelingError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let recorded = sqlx::query(
            r#"
            INSERT INTO daily_claim (user_id, last_claim) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET last_claim = EXCLUDED.last_claim
            WHERE daily_claim.last_claim < $3
            "#,
        )
        .bind(progress.user_id as i64)
        .bind(claimed_at)
        .bind(period_start)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .rows_affected();

        if recorded == 0 {
            tx.rollback().await.map_err(store_err)?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO xp (user_id, xp, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
              SET xp = EXCLUDED.xp,
                  level = EXCLUDED.level
            "#,
        )
        .bind(progress.user_id as i64)
        .bind(progress.xp)
        .bind(progress.level)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(true)
    }

    async fn rank(&self, user_id: u64) -> Result<Option<u32>, LevelingError> {
        let rank: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT position FROM (
                SELECT user_id,
                       ROW_NUMBER() OVER (ORDER BY level DESC, xp DESC, user_id ASC) AS position
                FROM xp
            ) ranked
            WHERE user_id = $1
            "#,
        )
        .bind(user_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rank.map(|r| r as u32))
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<XpProgress>, LevelingError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, xp, level FROM xp
            ORDER BY level DESC, xp DESC, user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.iter().map(row_to_progress).collect())
    }
}
