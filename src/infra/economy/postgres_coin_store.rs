// Postgres implementation of the CoinStore trait

use crate::core::economy::{BalanceChange, CoinStore, EconomyError, Settlement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Row, Transaction};

pub struct PostgresCoinStore {
    pool: PgPool,
}

fn store_err(e: sqlx::Error) -> EconomyError {
    EconomyError::StoreError(e.to_string())
}

impl PostgresCoinStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the coin tables if they don't exist yet.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coins (
                user_id BIGINT PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_coin_claim (
                user_id BIGINT PRIMARY KEY,
                last_claim TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_settlements (
                settlement_key TEXT PRIMARY KEY,
                user_id BIGINT NOT NULL,
                delta BIGINT NOT NULL,
                applied_delta BIGINT,
                balance_after BIGINT,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            ALTER TABLE coin_settlements
                ADD COLUMN IF NOT EXISTS applied_delta BIGINT,
                ADD COLUMN IF NOT EXISTS balance_after BIGINT
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Add `delta` inside an open transaction, clamping at zero.
async fn apply_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: u64,
    delta: i64,
) -> Result<BalanceChange, EconomyError> {
    let old_balance: i64 = sqlx::query_scalar(
        "SELECT balance FROM coins WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id as i64)
    .fetch_optional(&mut **tx)
    .await
    .map_err(store_err)?
    .unwrap_or(0);

    let new_balance: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO coins (user_id, balance)
        VALUES ($1, GREATEST($2, 0))
        ON CONFLICT (user_id) DO UPDATE SET balance = GREATEST(coins.balance + $3, 0)
        RETURNING balance
        "#,
    )
    .bind(user_id as i64)
    .bind(delta)
    .bind(delta)
    .fetch_one(&mut **tx)
    .await
    .map_err(store_err)?;

    Ok(BalanceChange {
        old_balance,
        new_balance,
    })
}

#[async_trait]
impl CoinStore for PostgresCoinStore {
    async fn balance(&self, user_id: u64) -> Result<i64, EconomyError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM coins WHERE user_id = $1")
                .bind(user_id as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(balance.unwrap_or(0))
    }

    async fn apply_delta(&self, user_id: u64, delta: i64) -> Result<BalanceChange, EconomyError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let change = apply_in_tx(&mut tx, user_id, delta).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(change)
    }

    async fn set_balance(
        &self,
        user_id: u64,
        balance: i64,
    ) -> Result<BalanceChange, EconomyError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let old_balance: i64 =
            sqlx::query_scalar("SELECT balance FROM coins WHERE user_id = $1 FOR UPDATE")
                .bind(user_id as i64)
                .fetch_optional(&mut *tx)
                .await
                .map_err(store_err)?
                .unwrap_or(0);

        let new_balance = balance.max(0);
        sqlx::query(
            r#"
            INSERT INTO coins (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance
            "#,
        )
        .bind(user_id as i64)
        .bind(new_balance)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        Ok(BalanceChange {
            old_balance,
            new_balance,
        })
    }

    async fn grant_daily(
        &self,
        user_id: u64,
        amount: i64,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<Option<i64>, EconomyError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // The conditional upsert only returns a row when no claim exists for
        // the current period, so two concurrent clicks can't both succeed.
        let recorded = sqlx::query(
            r#"
            INSERT INTO daily_coin_claim (user_id, last_claim) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET last_claim = EXCLUDED.last_claim
            WHERE daily_coin_claim.last_claim < $3
            RETURNING user_id
            "#,
        )
        .bind(user_id as i64)
        .bind(claimed_at)
        .bind(period_start)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        if recorded.is_none() {
            tx.rollback().await.map_err(store_err)?;
            return Ok(None);
        }

        let change = apply_in_tx(&mut tx, user_id, amount).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(Some(change.new_balance))
    }

    async fn transfer(
        &self,
        from: u64,
        to: u64,
        amount: i64,
        fee: i64,
    ) -> Result<(i64, i64), EconomyError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Lock both rows lowest id first.
        let locked = sqlx::query(
            r#"
            SELECT user_id, balance FROM coins
            WHERE user_id = ANY($1)
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(vec![from as i64, to as i64])
        .fetch_all(&mut *tx)
        .await
        .map_err(store_err)?;

        let available = locked
            .iter()
            .find(|row| row.get::<i64, _>("user_id") == from as i64)
            .map(|row| row.get::<i64, _>("balance"))
            .unwrap_or(0);

        if available < amount {
            tx.rollback().await.map_err(store_err)?;
            return Err(EconomyError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let sender = apply_in_tx(&mut tx, from, -amount).await?;
        let recipient = apply_in_tx(&mut tx, to, amount - fee).await?;
        tx.commit().await.map_err(store_err)?;

        Ok((sender.new_balance, recipient.new_balance))
    }

    async fn settle(
        &self,
        key: &str,
        user_id: u64,
        delta: i64,
    ) -> Result<Settlement, EconomyError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO coin_settlements (settlement_key, user_id, delta)
            VALUES ($1, $2, $3)
            ON CONFLICT (settlement_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(user_id as i64)
        .bind(delta)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .rows_affected();

        if inserted == 0 {
            let row = sqlx::query(
                r#"
                SELECT COALESCE(applied_delta, delta) AS applied_delta, balance_after
                FROM coin_settlements WHERE settlement_key = $1
                "#,
            )
            .bind(key)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_err)?;
            tx.rollback().await.map_err(store_err)?;

            // Rows written before balance_after existed fall back to the
            // live balance.
            let new_balance = match row.get::<Option<i64>, _>("balance_after") {
                Some(balance) => balance,
                None => self.balance(user_id).await?,
            };
            return Ok(Settlement {
                delta: row.get("applied_delta"),
                new_balance,
                replayed: true,
            });
        }

        let change = apply_in_tx(&mut tx, user_id, delta).await?;

        sqlx::query(
            r#"
            UPDATE coin_settlements SET applied_delta = $2, balance_after = $3
            WHERE settlement_key = $1
            "#,
        )
        .bind(key)
        .bind(change.delta())
        .bind(change.new_balance)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;

        Ok(Settlement {
            delta: change.delta(),
            new_balance: change.new_balance,
            replayed: false,
        })
    }

    async fn top_balances(&self, offset: i64, limit: i64) -> Result<Vec<(u64, i64)>, EconomyError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, balance FROM coins
            ORDER BY balance DESC, user_id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<i64, _>("user_id") as u64,
                    row.get::<i64, _>("balance"),
                )
            })
            .collect())
    }

    async fn holder_count(&self) -> Result<i64, EconomyError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM coins")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }
}
