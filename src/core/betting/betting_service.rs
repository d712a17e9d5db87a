// Admin-run team predictions. Stakes leave the wallet when the bet is placed;
// cancelling refunds them and closing pays the winners their share of the
// pool. Every coin movement goes through a settlement key so a retried
// interaction never moves coins twice.

use super::prediction::{Prediction, PredictionError, Side};
use crate::core::economy::{CoinStore, EconomyError, EconomyService};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum BettingError {
    #[error("A prediction is already open, close or cancel it first")]
    AlreadyOpen,

    #[error("There is no open prediction")]
    NoActivePrediction,

    #[error("This prediction is no longer open")]
    StalePrediction,

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Economy(#[from] EconomyError),
}

#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub prediction: Prediction,
    pub side: Side,
    pub staked: i64,
    /// The user's total on that side after this bet.
    pub user_total: i64,
    pub balance: i64,
}

/// Result of closing or cancelling a prediction.
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub prediction: Prediction,
    /// None when the prediction was cancelled.
    pub winner: Option<Side>,
    pub odds: Option<f64>,
    /// (user_id, coins credited): payouts, or refunds on cancel.
    pub credited: Vec<(u64, i64)>,
    /// Users whose credit could not be written.
    pub unsettled: Vec<u64>,
}

pub struct BettingService<S: CoinStore> {
    economy: Arc<EconomyService<S>>,
    current: Mutex<Option<Prediction>>,
}

impl<S: CoinStore> BettingService<S> {
    pub fn new(economy: Arc<EconomyService<S>>) -> Self {
        Self {
            economy,
            current: Mutex::new(None),
        }
    }

    pub async fn open(
        &self,
        id: u64,
        channel_id: u64,
        first: &str,
        second: &str,
    ) -> Result<Prediction, BettingError> {
        let mut slot = self.current.lock().await;
        if slot.is_some() {
            return Err(BettingError::AlreadyOpen);
        }
        let prediction = Prediction::new(id, channel_id, first, second)?;
        *slot = Some(prediction.clone());

        tracing::info!(id, first, second, "Prediction opened");
        Ok(prediction)
    }

    pub async fn set_message(&self, message_id: u64) -> Result<(), BettingError> {
        let mut slot = self.current.lock().await;
        let prediction = slot.as_mut().ok_or(BettingError::NoActivePrediction)?;
        prediction.message_id = Some(message_id);
        Ok(())
    }

    pub async fn current(&self) -> Option<Prediction> {
        self.current.lock().await.clone()
    }

    /// Stake `amount` on `side`. `message_id` is the prediction message the
    /// button was pressed on; `placement_id` identifies this bet for retries.
    pub async fn place(
        &self,
        user_id: u64,
        side: Side,
        amount: i64,
        message_id: u64,
        placement_id: u64,
    ) -> Result<BetReceipt, BettingError> {
        let mut slot = self.current.lock().await;
        let prediction = slot.as_mut().ok_or(BettingError::NoActivePrediction)?;
        if prediction.message_id != Some(message_id) {
            return Err(BettingError::StalePrediction);
        }
        prediction.check_side(user_id, side)?;
        self.economy.ensure_affordable(user_id, amount).await?;

        let key = format!("bet:{}:stake:{placement_id}", prediction.id);
        let settlement = self.economy.settle(&key, user_id, -amount).await?;
        let staked = -settlement.delta;

        let user_total = if settlement.replayed {
            prediction
                .stakes(side)
                .iter()
                .find(|(u, _)| *u == user_id)
                .map(|(_, total)| *total)
                .unwrap_or(staked)
        } else {
            prediction.add_stake(user_id, side, staked)?
        };

        tracing::info!(
            user_id,
            prediction = prediction.id,
            team = prediction.team(side),
            staked,
            "Bet placed"
        );
        Ok(BetReceipt {
            prediction: prediction.clone(),
            side,
            staked,
            user_total,
            balance: settlement.new_balance,
        })
    }

    /// Refund every stake and drop the prediction.
    pub async fn cancel(&self) -> Result<PredictionOutcome, BettingError> {
        let prediction = self
            .current
            .lock()
            .await
            .take()
            .ok_or(BettingError::NoActivePrediction)?;

        let refunds: Vec<(u64, i64)> = prediction.all_stakes().collect();
        let unsettled = self.credit(&prediction, "refund", &refunds).await;

        tracing::info!(id = prediction.id, refunds = refunds.len(), "Prediction cancelled");
        Ok(PredictionOutcome {
            prediction,
            winner: None,
            odds: None,
            credited: refunds,
            unsettled,
        })
    }

    /// Pay the backers of `winner` and drop the prediction. Fails, leaving it
    /// open, when nobody backed the winner.
    pub async fn close(&self, winner: Side) -> Result<PredictionOutcome, BettingError> {
        let (prediction, payouts) = {
            let mut slot = self.current.lock().await;
            let prediction = slot.as_ref().ok_or(BettingError::NoActivePrediction)?;
            let payouts = prediction.payouts(winner)?;
            let prediction = slot.take().ok_or(BettingError::NoActivePrediction)?;
            (prediction, payouts)
        };

        let unsettled = self.credit(&prediction, "payout", &payouts).await;

        tracing::info!(
            id = prediction.id,
            winner = prediction.team(winner),
            total = prediction.total(),
            "Prediction closed"
        );
        Ok(PredictionOutcome {
            odds: prediction.odds(winner),
            winner: Some(winner),
            prediction,
            credited: payouts,
            unsettled,
        })
    }

    /// Credit every user, carrying on past failures. Returns who failed.
    async fn credit(&self, prediction: &Prediction, kind: &str, credits: &[(u64, i64)]) -> Vec<u64> {
        let mut unsettled = Vec::new();
        for &(user_id, amount) in credits {
            if amount <= 0 {
                continue;
            }
            let key = format!("bet:{}:{kind}:{user_id}", prediction.id);
            if let Err(e) = self.economy.settle(&key, user_id, amount).await {
                tracing::error!(user_id, amount, prediction = prediction.id, "Bet {kind} failed: {e}");
                unsettled.push(user_id);
            }
        }
        unsettled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::economy::BalanceAction;
    use crate::infra::economy::InMemoryCoinStore;

    const MESSAGE: u64 = 555;

    async fn betting_with(balances: &[(u64, i64)]) -> BettingService<InMemoryCoinStore> {
        let economy = Arc::new(EconomyService::new(InMemoryCoinStore::new()));
        for &(user, amount) in balances {
            economy.modify(user, BalanceAction::Set, amount).await.unwrap();
        }
        let betting = BettingService::new(economy);
        betting.open(1, 10, "Red", "Blue").await.unwrap();
        betting.set_message(MESSAGE).await.unwrap();
        betting
    }

    async fn balance(betting: &BettingService<InMemoryCoinStore>, user: u64) -> i64 {
        betting.economy.balance(user).await.unwrap()
    }

    #[tokio::test]
    async fn only_one_prediction_at_a_time() {
        let betting = betting_with(&[]).await;
        assert!(matches!(
            betting.open(2, 10, "A", "B").await,
            Err(BettingError::AlreadyOpen)
        ));
    }

    #[tokio::test]
    async fn placing_a_bet_takes_the_stake() {
        let betting = betting_with(&[(1, 500)]).await;

        let receipt = betting.place(1, Side::First, 200, MESSAGE, 71).await.unwrap();
        assert_eq!(receipt.staked, 200);
        assert_eq!(receipt.balance, 300);
        assert_eq!(receipt.prediction.pool(Side::First), 200);

        let more = betting.place(1, Side::First, 50, MESSAGE, 72).await.unwrap();
        assert_eq!(more.user_total, 250);
        assert_eq!(balance(&betting, 1).await, 250);
    }

    #[tokio::test]
    async fn retried_bet_is_charged_once() {
        let betting = betting_with(&[(1, 500)]).await;

        betting.place(1, Side::First, 200, MESSAGE, 71).await.unwrap();
        let retry = betting.place(1, Side::First, 200, MESSAGE, 71).await.unwrap();

        assert_eq!(retry.user_total, 200);
        assert_eq!(retry.prediction.pool(Side::First), 200);
        assert_eq!(balance(&betting, 1).await, 300);
    }

    #[tokio::test]
    async fn bets_are_validated() {
        let betting = betting_with(&[(1, 100), (2, 100)]).await;
        betting.place(1, Side::First, 10, MESSAGE, 1).await.unwrap();

        assert!(matches!(
            betting.place(1, Side::Second, 10, MESSAGE, 2).await,
            Err(BettingError::Prediction(PredictionError::OtherSide(_)))
        ));
        assert!(matches!(
            betting.place(2, Side::First, 101, MESSAGE, 3).await,
            Err(BettingError::Economy(EconomyError::InsufficientFunds { .. }))
        ));
        assert!(matches!(
            betting.place(2, Side::First, 0, MESSAGE, 4).await,
            Err(BettingError::Economy(EconomyError::InvalidAmount))
        ));
        assert!(matches!(
            betting.place(2, Side::First, 10, MESSAGE + 1, 5).await,
            Err(BettingError::StalePrediction)
        ));
        assert_eq!(balance(&betting, 1).await, 90);
    }

    #[tokio::test]
    async fn closing_pays_the_winners_share() {
        let betting = betting_with(&[(1, 100), (2, 100), (3, 300)]).await;
        betting.place(1, Side::First, 100, MESSAGE, 1).await.unwrap();
        betting.place(2, Side::First, 50, MESSAGE, 2).await.unwrap();
        betting.place(3, Side::Second, 150, MESSAGE, 3).await.unwrap();

        let outcome = betting.close(Side::First).await.unwrap();
        assert_eq!(outcome.winner, Some(Side::First));
        assert_eq!(outcome.odds, Some(2.0));
        assert_eq!(outcome.credited, vec![(1, 200), (2, 100)]);
        assert!(outcome.unsettled.is_empty());

        assert_eq!(balance(&betting, 1).await, 200);
        assert_eq!(balance(&betting, 2).await, 150);
        assert_eq!(balance(&betting, 3).await, 150);
        assert!(betting.current().await.is_none());
    }

    #[tokio::test]
    async fn closing_on_an_unbacked_team_keeps_the_prediction() {
        let betting = betting_with(&[(1, 100)]).await;
        betting.place(1, Side::First, 100, MESSAGE, 1).await.unwrap();

        assert!(matches!(
            betting.close(Side::Second).await,
            Err(BettingError::Prediction(PredictionError::NoWinningBets(_)))
        ));
        assert!(betting.current().await.is_some());
    }

    #[tokio::test]
    async fn cancelling_refunds_everyone() {
        let betting = betting_with(&[(1, 100), (2, 100)]).await;
        betting.place(1, Side::First, 60, MESSAGE, 1).await.unwrap();
        betting.place(2, Side::Second, 25, MESSAGE, 2).await.unwrap();

        let outcome = betting.cancel().await.unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.credited, vec![(1, 60), (2, 25)]);

        assert_eq!(balance(&betting, 1).await, 100);
        assert_eq!(balance(&betting, 2).await, 100);
        assert!(matches!(
            betting.cancel().await,
            Err(BettingError::NoActivePrediction)
        ));
    }
}
