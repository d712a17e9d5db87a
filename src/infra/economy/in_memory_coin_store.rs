// In-memory CoinStore used by the service tests.
//
// A single Mutex guards all maps so every operation is atomic, the same
// guarantee the Postgres store gets from transactions.

use crate::core::economy::{BalanceChange, CoinStore, EconomyError, Settlement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    balances: HashMap<u64, i64>,
    daily_claims: HashMap<u64, DateTime<Utc>>,
    /// key -> (applied delta, balance after)
    settlements: HashMap<String, (i64, i64)>,
}

#[derive(Default)]
pub struct InMemoryCoinStore {
    state: Mutex<State>,
}

impl InMemoryCoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, EconomyError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EconomyError::StoreError(e.to_string()))?;
        Ok(f(&mut state))
    }
}

fn apply(state: &mut State, user_id: u64, delta: i64) -> BalanceChange {
    let balance = state.balances.entry(user_id).or_insert(0);
    let old_balance = *balance;
    *balance = (old_balance + delta).max(0);
    BalanceChange {
        old_balance,
        new_balance: *balance,
    }
}

#[async_trait]
impl CoinStore for InMemoryCoinStore {
    async fn balance(&self, user_id: u64) -> Result<i64, EconomyError> {
        self.with_state(|s| s.balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn apply_delta(&self, user_id: u64, delta: i64) -> Result<BalanceChange, EconomyError> {
        self.with_state(|s| apply(s, user_id, delta))
    }

    async fn set_balance(
        &self,
        user_id: u64,
        balance: i64,
    ) -> Result<BalanceChange, EconomyError> {
        self.with_state(|s| {
            let entry = s.balances.entry(user_id).or_insert(0);
            let old_balance = *entry;
            *entry = balance.max(0);
            BalanceChange {
                old_balance,
                new_balance: *entry,
            }
        })
    }

    async fn grant_daily(
        &self,
        user_id: u64,
        amount: i64,
        claimed_at: DateTime<Utc>,
        period_start: DateTime<Utc>,
    ) -> Result<Option<i64>, EconomyError> {
        self.with_state(|s| {
            if let Some(last) = s.daily_claims.get(&user_id) {
                if *last >= period_start {
                    return None;
                }
            }
            s.daily_claims.insert(user_id, claimed_at);
            Some(apply(s, user_id, amount).new_balance)
        })
    }

    async fn transfer(
        &self,
        from: u64,
        to: u64,
        amount: i64,
        fee: i64,
    ) -> Result<(i64, i64), EconomyError> {
        self.with_state(|s| {
            let available = s.balances.get(&from).copied().unwrap_or(0);
            if available < amount {
                return Err(EconomyError::InsufficientFunds {
                    required: amount,
                    available,
                });
            }
            let sender = apply(s, from, -amount).new_balance;
            let recipient = apply(s, to, amount - fee).new_balance;
            Ok((sender, recipient))
        })?
    }

    async fn settle(
        &self,
        key: &str,
        user_id: u64,
        delta: i64,
    ) -> Result<Settlement, EconomyError> {
        self.with_state(|s| {
            if let Some((applied, balance_after)) = s.settlements.get(key).copied() {
                return Settlement {
                    delta: applied,
                    new_balance: balance_after,
                    replayed: true,
                };
            }
            let change = apply(s, user_id, delta);
            s.settlements
                .insert(key.to_string(), (change.delta(), change.new_balance));
            Settlement {
                delta: change.delta(),
                new_balance: change.new_balance,
                replayed: false,
            }
        })
    }

    async fn top_balances(&self, offset: i64, limit: i64) -> Result<Vec<(u64, i64)>, EconomyError> {
        self.with_state(|s| {
            let mut rows: Vec<(u64, i64)> = s.balances.iter().map(|(k, v)| (*k, *v)).collect();
            rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            rows.into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect()
        })
    }

    async fn holder_count(&self) -> Result<i64, EconomyError> {
        self.with_state(|s| s.balances.len() as i64)
    }
}
