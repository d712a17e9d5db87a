// Economy system core - business logic for server coins
//
// Platform-agnostic: works with raw user IDs and amounts. Every balance change
// is clamped so a wallet can never go below zero.

use crate::core::timezones::{reset_day_start, time_until_reset};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A balance before and after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub old_balance: i64,
    pub new_balance: i64,
}

impl BalanceChange {
    pub fn delta(&self) -> i64 {
        self.new_balance - self.old_balance
    }
}

/// Admin balance adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAction {
    Add,
    Remove,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DailyClaimOutcome {
    Claimed { awarded: i64, new_balance: i64 },
    AlreadyClaimed { retry_in: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub amount: i64,
    pub fee: i64,
    pub received: i64,
    pub sender_balance: i64,
    pub recipient_balance: i64,
}

/// Outcome of applying a keyed settlement.
///
/// `delta` is the change actually applied after clamping at zero. When
/// `replayed` is true the key had already been applied, the balance was left
/// untouched and both fields repeat the recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub delta: i64,
    pub new_balance: i64,
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinLeaderboardPage {
    /// (user_id, balance), richest first.
    pub entries: Vec<(u64, i64)>,
    pub page: u32,
    pub total_pages: u32,
    pub per_page: u32,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EconomyError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient funds: need {required} coins, but only have {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("You can't send coins to yourself")]
    SelfTransfer,

    #[error("Store error: {0}")]
    StoreError(String),
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Persistence for balances, daily claims and the settlement ledger.
///
/// Every method that changes a balance must do so atomically.
#[async_trait]
pub trait CoinStore: Send + Sync {
    /// Current balance, 0 for users without a row.
    async fn balance(&self, user_id: u64) -> Result<i64, EconomyError>;

    /// Add `delta` (possibly negative), clamping the result at 0.
    async fn apply_delta(&self, user_id: u64, delta: i64) -> Result<BalanceChange, EconomyError>;

    /// Overwrite the balance.
    async fn set_balance(&self, user_id: u64, balance: i64)
        -> Result<BalanceChange, EconomyError>;

    /// Grant the daily reward unless a claim was already recorded at or after
    /// `period_start`. Returns the new balance, or None when already claimed.
    async fn grant_daily(
        &self,
        user_id: u64,
        amount: i64,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<Option<i64>, EconomyError>;

    /// Move `amount` out of `from` and `amount - fee` into `to`.
    /// Fails with InsufficientFunds without changing anything.
    async fn transfer(
        &self,
        from: u64,
        to: u64,
        amount: i64,
        fee: i64,
    ) -> Result<(i64, i64), EconomyError>;

    /// Apply `delta` once per `key` (clamped at 0).
    async fn settle(&self, key: &str, user_id: u64, delta: i64)
        -> Result<Settlement, EconomyError>;

    /// Balances ordered richest first.
    async fn top_balances(&self, offset: i64, limit: i64) -> Result<Vec<(u64, i64)>, EconomyError>;

    /// How many users have a coin row.
    async fn holder_count(&self) -> Result<i64, EconomyError>;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct EconomyConfig {
    /// Coins granted by the daily claim.
    pub daily_reward: i64,

    /// Transfer fee in percent, rounded down.
    pub transfer_fee_percent: i64,

    pub leaderboard_page_size: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            daily_reward: 100,
            transfer_fee_percent: 10,
            leaderboard_page_size: 10,
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct EconomyService<S: CoinStore> {
    store: S,
    config: EconomyConfig,
}

impl<S: CoinStore> EconomyService<S> {
    #[cfg(test)]
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: EconomyConfig::default(),
        }
    }

    pub fn new_with_config(store: S, config: EconomyConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub async fn balance(&self, user_id: u64) -> Result<i64, EconomyError> {
        self.store.balance(user_id).await
    }

    /// Check that `bet` is a valid stake for this user. Returns the balance.
    pub async fn ensure_affordable(&self, user_id: u64, bet: i64) -> Result<i64, EconomyError> {
        if bet <= 0 {
            return Err(EconomyError::InvalidAmount);
        }
        let available = self.store.balance(user_id).await?;
        if bet > available {
            return Err(EconomyError::InsufficientFunds {
                required: bet,
                available,
            });
        }
        Ok(available)
    }

    /// Claim the daily coins. One claim per New York calendar day.
    pub async fn claim_daily(
        &self,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<DailyClaimOutcome, EconomyError> {
        let granted = self
            .store
            .grant_daily(user_id, self.config.daily_reward, now, reset_day_start(now))
            .await?;

        Ok(match granted {
            Some(new_balance) => DailyClaimOutcome::Claimed {
                awarded: self.config.daily_reward,
                new_balance,
            },
            None => DailyClaimOutcome::AlreadyClaimed {
                retry_in: time_until_reset(now),
            },
        })
    }

    /// Admin adjustment. Remove and Set never leave a negative balance.
    pub async fn modify(
        &self,
        user_id: u64,
        action: BalanceAction,
        amount: i64,
    ) -> Result<BalanceChange, EconomyError> {
        if amount < 0 || (amount == 0 && action != BalanceAction::Set) {
            return Err(EconomyError::InvalidAmount);
        }

        match action {
            BalanceAction::Add => self.store.apply_delta(user_id, amount).await,
            BalanceAction::Remove => self.store.apply_delta(user_id, -amount).await,
            BalanceAction::Set => self.store.set_balance(user_id, amount).await,
        }
    }

    /// Send coins to another member. The sender pays the full amount and the
    /// recipient receives it minus the fee.
    pub async fn transfer(
        &self,
        from: u64,
        to: u64,
        amount: i64,
    ) -> Result<TransferReceipt, EconomyError> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount);
        }
        if from == to {
            return Err(EconomyError::SelfTransfer);
        }

        let fee = amount * self.config.transfer_fee_percent / 100;
        let (sender_balance, recipient_balance) =
            self.store.transfer(from, to, amount, fee).await?;

        tracing::info!(from, to, amount, fee, "Coins transferred");

        Ok(TransferReceipt {
            amount,
            fee,
            received: amount - fee,
            sender_balance,
            recipient_balance,
        })
    }

    /// Apply a game result or reward exactly once for `key`.
    pub async fn settle(
        &self,
        key: &str,
        user_id: u64,
        delta: i64,
    ) -> Result<Settlement, EconomyError> {
        let settlement = self.store.settle(key, user_id, delta).await?;
        if settlement.replayed {
            tracing::warn!(key, user_id, "Settlement already applied, skipping");
        }
        Ok(settlement)
    }

    /// One page of the coin leaderboard (pages are 1-based and clamped).
    pub async fn leaderboard_page(&self, page: u32) -> Result<CoinLeaderboardPage, EconomyError> {
        let per_page = self.config.leaderboard_page_size.max(1);
        let count = self.store.holder_count().await?;
        let total_pages = total_pages(count, per_page);
        let page = page.clamp(1, total_pages);

        let offset = i64::from((page - 1) * per_page);
        let entries = self
            .store
            .top_balances(offset, i64::from(per_page))
            .await?;

        Ok(CoinLeaderboardPage {
            entries,
            page,
            total_pages,
            per_page,
        })
    }
}

fn total_pages(count: i64, per_page: u32) -> u32 {
    if count <= 0 {
        1
    } else {
        ((count - 1) / i64::from(per_page) + 1) as u32
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::economy::InMemoryCoinStore;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn service() -> EconomyService<InMemoryCoinStore> {
        EconomyService::new(InMemoryCoinStore::new())
    }

    #[tokio::test]
    async fn daily_claim_once_per_new_york_day() {
        let service = service();

        // 23:00 New York on Jan 1
        let first = service.claim_daily(1, utc("2024-01-02T04:00:00Z")).await.unwrap();
        assert_eq!(
            first,
            DailyClaimOutcome::Claimed {
                awarded: 100,
                new_balance: 100
            }
        );

        // 23:30 same New York day
        let again = service.claim_daily(1, utc("2024-01-02T04:30:00Z")).await.unwrap();
        assert_eq!(
            again,
            DailyClaimOutcome::AlreadyClaimed {
                retry_in: Duration::minutes(30)
            }
        );

        // 00:10 New York on Jan 2
        let next_day = service.claim_daily(1, utc("2024-01-02T05:10:00Z")).await.unwrap();
        assert!(matches!(
            next_day,
            DailyClaimOutcome::Claimed {
                new_balance: 200,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn modify_clamps_at_zero() {
        let service = service();
        service.modify(7, BalanceAction::Add, 50).await.unwrap();

        let removed = service.modify(7, BalanceAction::Remove, 80).await.unwrap();
        assert_eq!(removed.new_balance, 0);
        assert_eq!(removed.delta(), -50);

        let set = service.modify(7, BalanceAction::Set, 25).await.unwrap();
        assert_eq!(set, BalanceChange { old_balance: 0, new_balance: 25 });

        assert_eq!(
            service.modify(7, BalanceAction::Add, -5).await,
            Err(EconomyError::InvalidAmount)
        );
    }

    #[tokio::test]
    async fn transfer_charges_ten_percent_fee() {
        let service = service();
        service.modify(1, BalanceAction::Add, 100).await.unwrap();

        let receipt = service.transfer(1, 2, 55).await.unwrap();
        assert_eq!(receipt.fee, 5);
        assert_eq!(receipt.received, 50);
        assert_eq!(receipt.sender_balance, 45);
        assert_eq!(receipt.recipient_balance, 50);
    }

    #[tokio::test]
    async fn transfer_rejects_bad_requests() {
        let service = service();
        service.modify(1, BalanceAction::Add, 10).await.unwrap();

        assert_eq!(service.transfer(1, 1, 5).await, Err(EconomyError::SelfTransfer));
        assert_eq!(service.transfer(1, 2, 0).await, Err(EconomyError::InvalidAmount));
        assert_eq!(
            service.transfer(1, 2, 11).await,
            Err(EconomyError::InsufficientFunds {
                required: 11,
                available: 10
            })
        );
        assert_eq!(service.balance(1).await.unwrap(), 10);
        assert_eq!(service.balance(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settlement_is_idempotent_per_key() {
        let service = service();
        service.modify(3, BalanceAction::Add, 100).await.unwrap();

        let first = service.settle("slots:abc", 3, 40).await.unwrap();
        assert_eq!(first.new_balance, 140);
        assert!(!first.replayed);

        let retry = service.settle("slots:abc", 3, 40).await.unwrap();
        assert!(retry.replayed);
        assert_eq!(retry.new_balance, 140);
        assert_eq!(service.balance(3).await.unwrap(), 140);

        let loss = service.settle("slots:def", 3, -500).await.unwrap();
        assert_eq!(loss.new_balance, 0);
    }

    #[tokio::test]
    async fn replayed_settlement_reports_the_clamped_outcome() {
        let service = service();
        service.modify(5, BalanceAction::Add, 30).await.unwrap();

        let loss = service.settle("crash:1:5", 5, -50).await.unwrap();
        assert_eq!(loss.delta, -30);
        assert_eq!(loss.new_balance, 0);

        // The balance moves on before the retry arrives.
        service.modify(5, BalanceAction::Add, 70).await.unwrap();

        let retry = service.settle("crash:1:5", 5, -50).await.unwrap();
        assert!(retry.replayed);
        assert_eq!(retry.delta, -30);
        assert_eq!(retry.new_balance, 0);
        assert_eq!(service.balance(5).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn ensure_affordable_validates_bet() {
        let service = service();
        service.modify(4, BalanceAction::Add, 30).await.unwrap();

        assert_eq!(service.ensure_affordable(4, 30).await, Ok(30));
        assert_eq!(service.ensure_affordable(4, 0).await, Err(EconomyError::InvalidAmount));
        assert!(matches!(
            service.ensure_affordable(4, 31).await,
            Err(EconomyError::InsufficientFunds { .. })
        ));
    }

    #[tokio::test]
    async fn leaderboard_pages_are_clamped() {
        let service = service();
        for user in 1..=12u64 {
            service
                .modify(user, BalanceAction::Add, user as i64 * 10)
                .await
                .unwrap();
        }

        let first = service.leaderboard_page(1).await.unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.entries.len(), 10);
        assert_eq!(first.entries[0], (12, 120));

        let last = service.leaderboard_page(9).await.unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.entries, vec![(2, 20), (1, 10)]);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
