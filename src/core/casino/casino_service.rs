// Casino orchestration: validates stakes against the economy, draws outcomes
// with the service RNG and settles the result under a per-round key so a
// retried interaction can't pay twice.

use super::blackjack::{BlackjackError, BlackjackGame};
use super::games::{
    coinflip_net, duel_nets, evaluate_reels, flip_coin, roll_die, roulette_net, rps_result,
    slots_net, spin_reels, spin_wheel, CoinSide, RouletteGuess, RpsChoice, RpsResult, SlotSymbol,
    SlotsResult, RPS_WIN_REWARD,
};
use crate::core::economy::{CoinStore, EconomyError, EconomyService};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CasinoError {
    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error(transparent)]
    Blackjack(#[from] BlackjackError),

    #[error("{0}")]
    InvalidGuess(String),

    #[error("You can play again in {0} seconds")]
    OnCooldown(i64),

    #[error("You can't challenge yourself")]
    SelfChallenge,

    #[error("Bots don't play dice")]
    BotOpponent,

    #[error("Your opponent doesn't have {0} coins")]
    OpponentCannotAfford(i64),

    #[error("Round key {0} was already used by another game")]
    KeyReused(String),
}

pub struct SlotsPlay {
    pub reels: [SlotSymbol; 3],
    pub result: SlotsResult,
    pub net: i64,
    pub balance: i64,
}

pub struct CoinflipPlay {
    pub landed: CoinSide,
    pub net: i64,
    pub balance: i64,
}

pub struct RoulettePlay {
    pub pocket: u8,
    pub net: i64,
    pub balance: i64,
}

pub struct DuelPlay {
    pub challenger_roll: u8,
    pub opponent_roll: u8,
    pub challenger_net: i64,
    pub opponent_net: i64,
}

pub struct RpsPlay {
    pub bot_choice: RpsChoice,
    pub result: RpsResult,
    pub reward: i64,
}

pub const RPS_COOLDOWN_SECS: i64 = 60;

/// How long a drawn outcome is kept for replays of the same round key.
const DRAW_RETENTION: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// A random outcome remembered per round key.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Draw {
    Reels([SlotSymbol; 3]),
    Coin(CoinSide),
    Pocket(u8),
    Dice(u8, u8),
}

pub struct CasinoService<S: CoinStore> {
    economy: Arc<EconomyService<S>>,
    rng: Mutex<StdRng>,
    draws: DashMap<String, (Draw, Instant)>,
    rps_last_played: DashMap<u64, DateTime<Utc>>,
}

impl<S: CoinStore> CasinoService<S> {
    pub fn new(economy: Arc<EconomyService<S>>) -> Self {
        Self::with_rng(economy, StdRng::from_entropy())
    }

    pub fn with_rng(economy: Arc<EconomyService<S>>, rng: StdRng) -> Self {
        Self {
            economy,
            rng: Mutex::new(rng),
            draws: DashMap::new(),
            rps_last_played: DashMap::new(),
        }
    }

    fn with_rng_mut<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned RNG is still a perfectly good RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// The outcome for `key`: the remembered one when this round was already
    /// drawn, otherwise a fresh draw.
    fn draw_once(&self, key: &str, fresh: impl FnOnce(&mut StdRng) -> Draw) -> Draw {
        self.draws
            .retain(|_, (_, drawn_at)| drawn_at.elapsed() < DRAW_RETENTION);
        if let Some(entry) = self.draws.get(key) {
            return entry.0;
        }
        let draw = self.with_rng_mut(fresh);
        self.draws
            .entry(key.to_string())
            .or_insert((draw, Instant::now()))
            .value()
            .0
    }

    async fn settle(&self, key: String, user_id: u64, net: i64) -> Result<i64, CasinoError> {
        Ok(self.economy.settle(&key, user_id, net).await?.new_balance)
    }

    pub async fn play_slots(
        &self,
        user_id: u64,
        bet: i64,
        round_id: u64,
    ) -> Result<SlotsPlay, CasinoError> {
        self.economy.ensure_affordable(user_id, bet).await?;

        let key = format!("slots:{round_id}");
        let reels = match self.draw_once(&key, |rng| Draw::Reels(spin_reels(rng))) {
            Draw::Reels(reels) => reels,
            _ => return Err(CasinoError::KeyReused(key)),
        };
        let result = evaluate_reels(&reels);
        let net = slots_net(result, bet);
        let balance = self.settle(key, user_id, net).await?;

        tracing::info!(user_id, bet, net, "Slots played");
        Ok(SlotsPlay {
            reels,
            result,
            net,
            balance,
        })
    }

    pub async fn play_coinflip(
        &self,
        user_id: u64,
        bet: i64,
        call: CoinSide,
        round_id: u64,
    ) -> Result<CoinflipPlay, CasinoError> {
        self.economy.ensure_affordable(user_id, bet).await?;

        let key = format!("coinflip:{round_id}");
        let landed = match self.draw_once(&key, |rng| Draw::Coin(flip_coin(rng))) {
            Draw::Coin(side) => side,
            _ => return Err(CasinoError::KeyReused(key)),
        };
        let net = coinflip_net(call, landed, bet);
        let balance = self.settle(key, user_id, net).await?;

        tracing::info!(user_id, bet, net, "Coinflip played");
        Ok(CoinflipPlay {
            landed,
            net,
            balance,
        })
    }

    pub async fn play_roulette(
        &self,
        user_id: u64,
        bet: i64,
        guess: &str,
        round_id: u64,
    ) -> Result<RoulettePlay, CasinoError> {
        let guess: RouletteGuess = guess.parse().map_err(CasinoError::InvalidGuess)?;
        self.economy.ensure_affordable(user_id, bet).await?;

        let key = format!("roulette:{round_id}");
        let pocket = match self.draw_once(&key, |rng| Draw::Pocket(spin_wheel(rng))) {
            Draw::Pocket(pocket) => pocket,
            _ => return Err(CasinoError::KeyReused(key)),
        };
        let net = roulette_net(guess, pocket, bet);
        let balance = self.settle(key, user_id, net).await?;

        tracing::info!(user_id, bet, pocket, net, "Roulette played");
        Ok(RoulettePlay {
            pocket,
            net,
            balance,
        })
    }

    /// Validate a dice duel before asking the opponent.
    pub async fn check_duel(
        &self,
        challenger: u64,
        opponent: u64,
        opponent_is_bot: bool,
        bet: i64,
    ) -> Result<(), CasinoError> {
        if challenger == opponent {
            return Err(CasinoError::SelfChallenge);
        }
        if opponent_is_bot {
            return Err(CasinoError::BotOpponent);
        }
        self.economy.ensure_affordable(challenger, bet).await?;
        match self.economy.ensure_affordable(opponent, bet).await {
            Ok(_) => Ok(()),
            Err(EconomyError::InsufficientFunds { .. }) => {
                Err(CasinoError::OpponentCannotAfford(bet))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Roll for both players once the opponent accepted. Balances are checked
    /// again because they may have changed while the challenge was open.
    pub async fn resolve_duel(
        &self,
        challenger: u64,
        opponent: u64,
        bet: i64,
        duel_id: u64,
    ) -> Result<DuelPlay, CasinoError> {
        self.check_duel(challenger, opponent, false, bet).await?;

        let key = format!("duel:{duel_id}");
        let (challenger_roll, opponent_roll) =
            match self.draw_once(&key, |rng| Draw::Dice(roll_die(rng), roll_die(rng))) {
                Draw::Dice(a, b) => (a, b),
                _ => return Err(CasinoError::KeyReused(key)),
            };
        let (challenger_net, opponent_net) = duel_nets(challenger_roll, opponent_roll, bet);

        self.settle(format!("duel:{duel_id}:{challenger}"), challenger, challenger_net)
            .await?;
        self.settle(format!("duel:{duel_id}:{opponent}"), opponent, opponent_net)
            .await?;

        tracing::info!(challenger, opponent, bet, challenger_roll, opponent_roll, "Dice duel");
        Ok(DuelPlay {
            challenger_roll,
            opponent_roll,
            challenger_net,
            opponent_net,
        })
    }

    /// Rock paper scissors against the bot. Free to play, wins pay a small
    /// reward, and each user may play once per minute.
    pub async fn play_rps(
        &self,
        user_id: u64,
        choice: RpsChoice,
        now: DateTime<Utc>,
        round_id: u64,
    ) -> Result<RpsPlay, CasinoError> {
        let cooldown = Duration::seconds(RPS_COOLDOWN_SECS);
        self.rps_last_played.retain(|_, last| now - *last < cooldown);

        if let Some(last) = self.rps_last_played.get(&user_id) {
            let ready_at = *last + cooldown;
            if now < ready_at {
                return Err(CasinoError::OnCooldown((ready_at - now).num_seconds().max(1)));
            }
        }
        self.rps_last_played.insert(user_id, now);

        let bot_choice = self.with_rng_mut(|rng| {
            *RpsChoice::ALL
                .choose(rng)
                .unwrap_or(&RpsChoice::Rock)
        });
        let result = rps_result(choice, bot_choice);
        let reward = if result == RpsResult::Win {
            RPS_WIN_REWARD
        } else {
            0
        };
        if reward > 0 {
            self.settle(format!("rps:{round_id}"), user_id, reward).await?;
        }

        Ok(RpsPlay {
            bot_choice,
            result,
            reward,
        })
    }

    /// Validate the stake and deal a new blackjack hand.
    pub async fn deal_blackjack(
        &self,
        user_id: u64,
        bet: i64,
    ) -> Result<BlackjackGame, CasinoError> {
        self.economy.ensure_affordable(user_id, bet).await?;
        Ok(self.with_rng_mut(|rng| BlackjackGame::deal(bet, rng))?)
    }

    /// Check the balance covers everything already on the table plus `extra`.
    pub async fn ensure_can_raise(
        &self,
        user_id: u64,
        game: &BlackjackGame,
        extra: i64,
    ) -> Result<(), CasinoError> {
        self.economy
            .ensure_affordable(user_id, game.committed_stake() + extra)
            .await?;
        Ok(())
    }

    /// Apply the finished game's total result.
    pub async fn settle_blackjack(
        &self,
        user_id: u64,
        game: &BlackjackGame,
        round_id: u64,
    ) -> Result<i64, CasinoError> {
        let net = game.net();
        let balance = self
            .settle(format!("blackjack:{round_id}"), user_id, net)
            .await?;
        tracing::info!(user_id, net, "Blackjack settled");
        Ok(balance)
    }
}
