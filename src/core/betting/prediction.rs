// A two-team prediction: who backed which side and with how much.
//
// Winners split the whole pool in proportion to their stake, so the odds of a
// side are `total / side pool`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error("Both teams need a name")]
    MissingTeamName,

    #[error("You already bet on {0}")]
    OtherSide(String),

    #[error("Nobody bet on {0}, pick another winner or cancel")]
    NoWinningBets(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::First, Side::Second];

    pub fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::First => 0,
            Side::Second => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: u64,
    pub channel_id: u64,
    pub message_id: Option<u64>,
    teams: [String; 2],
    /// (user_id, total stake) in the order users first bet.
    stakes: [Vec<(u64, i64)>; 2],
}

impl Prediction {
    pub fn new(
        id: u64,
        channel_id: u64,
        first: &str,
        second: &str,
    ) -> Result<Self, PredictionError> {
        let (first, second) = (first.trim(), second.trim());
        if first.is_empty() || second.is_empty() {
            return Err(PredictionError::MissingTeamName);
        }
        Ok(Self {
            id,
            channel_id,
            message_id: None,
            teams: [first.to_string(), second.to_string()],
            stakes: [Vec::new(), Vec::new()],
        })
    }

    pub fn team(&self, side: Side) -> &str {
        &self.teams[side.index()]
    }

    pub fn stakes(&self, side: Side) -> &[(u64, i64)] {
        &self.stakes[side.index()]
    }

    pub fn pool(&self, side: Side) -> i64 {
        self.stakes(side).iter().map(|(_, amount)| amount).sum()
    }

    pub fn total(&self) -> i64 {
        self.pool(Side::First) + self.pool(Side::Second)
    }

    /// Share of the total pool on `side`, in percent.
    pub fn share_percent(&self, side: Side) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.pool(side) as f64 * 100.0 / total as f64,
        }
    }

    /// Payout multiplier if `side` wins, None while nobody backs it.
    pub fn odds(&self, side: Side) -> Option<f64> {
        match self.pool(side) {
            0 => None,
            pool => Some(self.total() as f64 / pool as f64),
        }
    }

    pub fn side_of(&self, user_id: u64) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.stakes(*side).iter().any(|(u, _)| *u == user_id))
    }

    /// A user backs one side only; more bets on that side add up.
    pub fn check_side(&self, user_id: u64, side: Side) -> Result<(), PredictionError> {
        match self.side_of(user_id) {
            Some(current) if current != side => {
                Err(PredictionError::OtherSide(self.team(current).to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Record a stake. Returns the user's total on that side.
    pub fn add_stake(
        &mut self,
        user_id: u64,
        side: Side,
        amount: i64,
    ) -> Result<i64, PredictionError> {
        self.check_side(user_id, side)?;
        let stakes = &mut self.stakes[side.index()];
        match stakes.iter_mut().find(|(u, _)| *u == user_id) {
            Some((_, total)) => {
                *total += amount;
                Ok(*total)
            }
            None => {
                stakes.push((user_id, amount));
                Ok(amount)
            }
        }
    }

    /// Every stake on both sides, for refunds.
    pub fn all_stakes(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.stakes.iter().flatten().copied()
    }

    /// What each backer of `winner` receives, stake included. Rounded down.
    pub fn payouts(&self, winner: Side) -> Result<Vec<(u64, i64)>, PredictionError> {
        let pool = self.pool(winner);
        if pool <= 0 {
            return Err(PredictionError::NoWinningBets(self.team(winner).to_string()));
        }
        let total = i128::from(self.total());
        Ok(self
            .stakes(winner)
            .iter()
            .map(|&(user, stake)| (user, (i128::from(stake) * total / i128::from(pool)) as i64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction() -> Prediction {
        Prediction::new(1, 10, "Red", "Blue").unwrap()
    }

    #[test]
    fn team_names_are_required() {
        assert_eq!(
            Prediction::new(1, 10, "  ", "Blue"),
            Err(PredictionError::MissingTeamName)
        );
    }

    #[test]
    fn odds_follow_the_pools() {
        let mut p = prediction();
        assert_eq!(p.odds(Side::First), None);
        assert_eq!(p.share_percent(Side::First), 0.0);

        p.add_stake(1, Side::First, 100).unwrap();
        p.add_stake(2, Side::Second, 300).unwrap();

        assert_eq!(p.total(), 400);
        assert_eq!(p.odds(Side::First), Some(4.0));
        assert_eq!(p.odds(Side::Second), Some(400.0 / 300.0));
        assert_eq!(p.share_percent(Side::First), 25.0);
    }

    #[test]
    fn stakes_add_up_on_one_side_only() {
        let mut p = prediction();
        assert_eq!(p.add_stake(1, Side::First, 40), Ok(40));
        assert_eq!(p.add_stake(1, Side::First, 60), Ok(100));
        assert_eq!(
            p.add_stake(1, Side::Second, 10),
            Err(PredictionError::OtherSide("Red".to_string()))
        );
        assert_eq!(p.stakes(Side::First), &[(1, 100)]);
        assert_eq!(p.side_of(1), Some(Side::First));
        assert_eq!(p.side_of(2), None);
    }

    #[test]
    fn winners_split_the_whole_pool() {
        let mut p = prediction();
        p.add_stake(1, Side::First, 100).unwrap();
        p.add_stake(2, Side::First, 50).unwrap();
        p.add_stake(3, Side::Second, 151).unwrap();

        // total 301, pool 150: 100 * 301 / 150 = 200.67, 50 * 301 / 150 = 100.33
        assert_eq!(p.payouts(Side::First), Ok(vec![(1, 200), (2, 100)]));
        assert_eq!(
            p.payouts(Side::Second).unwrap(),
            vec![(3, 301)]
        );
    }

    #[test]
    fn closing_needs_a_backed_winner() {
        let mut p = prediction();
        p.add_stake(1, Side::First, 10).unwrap();
        assert_eq!(
            p.payouts(Side::Second),
            Err(PredictionError::NoWinningBets("Blue".to_string()))
        );
    }
}
