// One crash round at a time. The discord layer drives the clock (lobby delay
// and ticks); this service owns the round state and the payouts.

use super::crash_round::{draw_crash_point, CrashError, CrashResult, CrashRound, RoundPhase, Tick};
use crate::core::economy::{CoinStore, EconomyError, EconomyService};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CrashGameError {
    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error(transparent)]
    Round(#[from] CrashError),
}

#[derive(Debug, Clone)]
pub struct JoinReceipt {
    pub round_id: u64,
    /// The first player of a round starts the lobby countdown.
    pub opened_lobby: bool,
    pub players: usize,
}

#[derive(Debug, Clone)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub multiplier: f64,
    pub history: Vec<f64>,
    pub players: Vec<(u64, i64, Option<f64>)>,
}

#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round_id: u64,
    pub crash_point: f64,
    pub history: Vec<f64>,
    pub results: Vec<CrashResult>,
    /// Players whose result could not be written to the store.
    pub unsettled: Vec<u64>,
}

pub struct CrashService<S: CoinStore> {
    economy: Arc<EconomyService<S>>,
    round: Mutex<Option<CrashRound>>,
    rng: Mutex<StdRng>,
}

impl<S: CoinStore> CrashService<S> {
    pub fn new(economy: Arc<EconomyService<S>>) -> Self {
        Self::with_rng(economy, StdRng::from_entropy())
    }

    pub fn with_rng(economy: Arc<EconomyService<S>>, rng: StdRng) -> Self {
        Self {
            economy,
            round: Mutex::new(None),
            rng: Mutex::new(rng),
        }
    }

    /// Queue `user_id` for the next round. `round_id` names the round when
    /// this join opens a new lobby and is ignored otherwise.
    pub async fn join(
        &self,
        user_id: u64,
        bet: i64,
        round_id: u64,
    ) -> Result<JoinReceipt, CrashGameError> {
        self.economy.ensure_affordable(user_id, bet).await?;

        let mut slot = self.round.lock().await;
        let round = slot.get_or_insert_with(|| CrashRound::new(round_id));
        let opened_lobby = round.join(user_id, bet)?;

        tracing::info!(user_id, bet, round_id = round.round_id, "Crash join");
        Ok(JoinReceipt {
            round_id: round.round_id,
            opened_lobby,
            players: round.entries().len(),
        })
    }

    /// Close the lobby and draw the crash point.
    pub async fn start(&self) -> Option<RoundSnapshot> {
        let crash_point = {
            let mut rng = self.rng.lock().await;
            draw_crash_point(&mut *rng)
        };

        let mut slot = self.round.lock().await;
        let round = slot.as_mut()?;
        if round.phase() != RoundPhase::Lobby {
            return None;
        }
        round.start(crash_point);
        tracing::debug!(round_id = round.round_id, crash_point, "Crash round started");
        Some(snapshot(round))
    }

    /// Advance one tick. Returns the new snapshot and whether the round is over.
    pub async fn tick(&self) -> Option<(RoundSnapshot, bool)> {
        let mut slot = self.round.lock().await;
        let round = slot.as_mut()?;
        let crashed = matches!(round.tick(), Tick::Crashed(_));
        Some((snapshot(round), crashed))
    }

    pub async fn cash_out(&self, user_id: u64) -> Result<f64, CrashGameError> {
        let mut slot = self.round.lock().await;
        let round = slot.as_mut().ok_or(CrashError::NotRunning)?;
        let multiplier = round.cash_out(user_id)?;
        tracing::info!(user_id, multiplier, "Crash cash out");
        Ok(multiplier)
    }

    /// Settle every entry of a crashed round and clear it so the next join
    /// opens a fresh lobby. A failed settlement is logged and reported in
    /// `unsettled`; the remaining entries are still paid.
    pub async fn finish(&self) -> Option<RoundSummary> {
        let round = {
            let mut slot = self.round.lock().await;
            match slot.as_ref() {
                Some(r) if r.phase() == RoundPhase::Crashed => slot.take(),
                _ => None,
            }
        }?;

        let results = round.results();
        let mut unsettled = Vec::new();
        for result in &results {
            let key = settlement_key(round.round_id, result.user_id);
            if let Err(e) = self.economy.settle(&key, result.user_id, result.net).await {
                tracing::error!(
                    round_id = round.round_id,
                    user_id = result.user_id,
                    net = result.net,
                    "Crash settlement failed: {e}"
                );
                unsettled.push(result.user_id);
            }
        }

        Some(RoundSummary {
            round_id: round.round_id,
            crash_point: round.crash_point(),
            history: round.history().to_vec(),
            results,
            unsettled,
        })
    }

    /// Drop the current round whatever its phase. Bets are only charged when
    /// a round settles, so there is nothing to refund.
    pub async fn abort(&self) -> Option<u64> {
        let round = self.round.lock().await.take()?;
        tracing::warn!(
            round_id = round.round_id,
            players = round.entries().len(),
            "Crash round aborted"
        );
        Some(round.round_id)
    }
}

fn settlement_key(round_id: u64, user_id: u64) -> String {
    format!("crash:{round_id}:{user_id}")
}

fn snapshot(round: &CrashRound) -> RoundSnapshot {
    RoundSnapshot {
        round_id: round.round_id,
        multiplier: round.multiplier(),
        history: round.history().to_vec(),
        players: round
            .entries()
            .iter()
            .map(|e| (e.user_id, e.bet, e.cashed_at))
            .collect(),
    }
}
