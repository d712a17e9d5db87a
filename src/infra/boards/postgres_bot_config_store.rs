// Postgres implementation of the BotConfigStore trait

use crate::core::boards::{BoardError, BotConfigStore};
use async_trait::async_trait;
use sqlx::postgres::PgPool;

pub struct PostgresBotConfigStore {
    pool: PgPool,
}

fn store_err(e: sqlx::Error) -> BoardError {
    BoardError::StorageError(e.to_string())
}

impl PostgresBotConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_config (
                key TEXT PRIMARY KEY,
                value BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BotConfigStore for PostgresBotConfigStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, BoardError> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM bot_config WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(value.map(|v| v as u64))
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), BoardError> {
        sqlx::query(
            r#"
            INSERT INTO bot_config (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
