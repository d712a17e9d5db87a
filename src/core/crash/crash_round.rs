// Crash round state machine.
//
// Lobby -> Running -> Crashed. The multiplier grows 5% per tick (rounded to
// cents) and is pinned to the crash point on the tick that reaches it, so a
// cash-out can never record a value above the crash point.

use rand::Rng;
use thiserror::Error;

pub const MAX_MULTIPLIER: f64 = 20.0;
pub const MIN_MULTIPLIER: f64 = 1.02;
/// Chance that a round reaches MAX_MULTIPLIER.
pub const TAIL_PROBABILITY: f64 = 0.01;
pub const GROWTH_PER_TICK: f64 = 1.05;
pub const LOBBY_SECONDS: u64 = 20;
pub const TICK_SECONDS: u64 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum CrashError {
    #[error("A round is already running, wait for the next one")]
    RoundRunning,

    #[error("You're already in this round")]
    AlreadyJoined,

    #[error("You haven't joined this round")]
    NotJoined,

    #[error("You already cashed out")]
    AlreadyCashedOut,

    #[error("There is no running round")]
    NotRunning,
}

/// Exponent of the power-law tail, chosen so P(crash >= MAX) = TAIL_PROBABILITY.
pub fn tail_power() -> f64 {
    TAIL_PROBABILITY.ln() / (MIN_MULTIPLIER / MAX_MULTIPLIER).ln()
}

pub fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Map a uniform sample in (0, 1] to a crash point in [MIN, MAX], rounded up
/// to the next cent.
pub fn crash_point_from_uniform(u: f64) -> f64 {
    let raw = MIN_MULTIPLIER * u.powf(-1.0 / tail_power());
    let clamped = raw.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
    (clamped * 100.0).ceil() / 100.0
}

pub fn draw_crash_point<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    crash_point_from_uniform(rng.gen::<f64>())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Lobby,
    Running,
    Crashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrashEntry {
    pub user_id: u64,
    pub bet: i64,
    pub cashed_at: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Rising(f64),
    Crashed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrashResult {
    pub user_id: u64,
    pub bet: i64,
    pub cashed_at: Option<f64>,
    pub net: i64,
}

/// Net coins for one entry once the round is over.
pub fn entry_net(bet: i64, cashed_at: Option<f64>, crash_point: f64) -> i64 {
    match cashed_at {
        Some(multiplier) if multiplier <= crash_point => {
            (bet as f64 * multiplier).floor() as i64 - bet
        }
        _ => -bet,
    }
}

#[derive(Debug, Clone)]
pub struct CrashRound {
    pub round_id: u64,
    phase: RoundPhase,
    entries: Vec<CrashEntry>,
    multiplier: f64,
    crash_point: f64,
    history: Vec<f64>,
}

impl CrashRound {
    pub fn new(round_id: u64) -> Self {
        Self {
            round_id,
            phase: RoundPhase::Lobby,
            entries: Vec::new(),
            multiplier: 1.0,
            crash_point: 0.0,
            history: Vec::new(),
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn entries(&self) -> &[CrashEntry] {
        &self.entries
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn crash_point(&self) -> f64 {
        self.crash_point
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Queue a player. Returns true for the first entry of the round.
    pub fn join(&mut self, user_id: u64, bet: i64) -> Result<bool, CrashError> {
        if self.phase != RoundPhase::Lobby {
            return Err(CrashError::RoundRunning);
        }
        if self.entries.iter().any(|e| e.user_id == user_id) {
            return Err(CrashError::AlreadyJoined);
        }
        self.entries.push(CrashEntry {
            user_id,
            bet,
            cashed_at: None,
        });
        Ok(self.entries.len() == 1)
    }

    pub fn start(&mut self, crash_point: f64) {
        self.phase = RoundPhase::Running;
        self.multiplier = 1.0;
        self.crash_point = crash_point;
        self.history = vec![1.0];
    }

    pub fn tick(&mut self) -> Tick {
        if self.phase != RoundPhase::Running {
            return Tick::Crashed(self.crash_point);
        }

        let next = round_cents(self.multiplier * GROWTH_PER_TICK);
        if next >= self.crash_point {
            self.multiplier = self.crash_point;
            self.phase = RoundPhase::Crashed;
            self.history.push(self.crash_point);
            Tick::Crashed(self.crash_point)
        } else {
            self.multiplier = next;
            self.history.push(next);
            Tick::Rising(next)
        }
    }

    /// Lock in the current multiplier for a queued player.
    pub fn cash_out(&mut self, user_id: u64) -> Result<f64, CrashError> {
        if self.phase != RoundPhase::Running {
            return Err(CrashError::NotRunning);
        }
        let multiplier = self.multiplier;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.user_id == user_id)
            .ok_or(CrashError::NotJoined)?;
        if entry.cashed_at.is_some() {
            return Err(CrashError::AlreadyCashedOut);
        }
        entry.cashed_at = Some(multiplier);
        Ok(multiplier)
    }

    pub fn results(&self) -> Vec<CrashResult> {
        self.entries
            .iter()
            .map(|e| CrashResult {
                user_id: e.user_id,
                bet: e.bet,
                cashed_at: e.cashed_at,
                net: entry_net(e.bet, e.cashed_at, self.crash_point),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn crash_point_distribution_bounds() {
        assert_eq!(crash_point_from_uniform(1.0), MIN_MULTIPLIER);
        assert_eq!(crash_point_from_uniform(TAIL_PROBABILITY), MAX_MULTIPLIER);
        assert_eq!(crash_point_from_uniform(1e-9), MAX_MULTIPLIER);
        assert_eq!(crash_point_from_uniform(0.0), MAX_MULTIPLIER);

        let mid = crash_point_from_uniform(0.5);
        assert!(mid > MIN_MULTIPLIER && mid < 2.0, "mid = {mid}");
        // rounded up to cents
        assert_eq!(round_cents(mid), mid);
    }

    #[test]
    fn seeded_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..1_000 {
            let point = draw_crash_point(&mut rng);
            assert!((MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&point));
        }
    }

    #[test]
    fn lobby_rules() {
        let mut round = CrashRound::new(1);
        assert_eq!(round.join(10, 50), Ok(true));
        assert_eq!(round.join(11, 20), Ok(false));
        assert_eq!(round.join(10, 5), Err(CrashError::AlreadyJoined));

        round.start(1.5);
        assert_eq!(round.join(12, 5), Err(CrashError::RoundRunning));
    }

    #[test]
    fn ticks_grow_five_percent_until_the_crash() {
        let mut round = CrashRound::new(1);
        round.join(1, 10).unwrap();
        round.start(1.2);

        assert_eq!(round.tick(), Tick::Rising(1.05));
        assert_eq!(round.tick(), Tick::Rising(1.1));
        assert_eq!(round.tick(), Tick::Rising(1.16));
        assert_eq!(round.tick(), Tick::Crashed(1.2));
        assert_eq!(round.history(), &[1.0, 1.05, 1.1, 1.16, 1.2]);
        assert_eq!(round.phase(), RoundPhase::Crashed);
    }

    #[test]
    fn cash_out_rules() {
        let mut round = CrashRound::new(1);
        round.join(1, 100).unwrap();
        round.join(2, 100).unwrap();
        assert_eq!(round.cash_out(1), Err(CrashError::NotRunning));

        round.start(3.0);
        round.tick();
        round.tick();
        assert_eq!(round.cash_out(1), Ok(1.1));
        assert_eq!(round.cash_out(1), Err(CrashError::AlreadyCashedOut));
        assert_eq!(round.cash_out(3), Err(CrashError::NotJoined));

        while let Tick::Rising(_) = round.tick() {}
        assert_eq!(round.cash_out(2), Err(CrashError::NotRunning));

        let results = round.results();
        assert_eq!(results[0].net, 10);
        assert_eq!(results[1].net, -100);
    }

    #[test]
    fn entry_net_floors_the_payout() {
        assert_eq!(entry_net(15, Some(1.5), 2.0), 7);
        assert_eq!(entry_net(15, Some(2.5), 2.0), -15);
        assert_eq!(entry_net(15, None, 2.0), -15);
    }
}
