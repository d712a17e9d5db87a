// Party finder: a member posts a party with a size and a tier range, others
// join or leave through buttons on the post.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

pub const PARTY_SIZES: [usize; 3] = [2, 3, 5];

/// A party voice channel nobody joined within this many minutes is removed.
pub const PARTY_VOICE_GRACE_MINUTES: u64 = 10;

/// Parties older than this are forgotten.
pub const PARTY_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Ascendant,
    Immortal,
    Radiant,
}

impl Tier {
    pub const ALL: [Tier; 9] = [
        Tier::Iron,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
        Tier::Ascendant,
        Tier::Immortal,
        Tier::Radiant,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Iron => "Iron",
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
            Tier::Ascendant => "Ascendant",
            Tier::Immortal => "Immortal",
            Tier::Radiant => "Radiant",
        }
    }

    /// Every tier from `low` to `high`, whichever order they come in.
    pub fn range(a: Tier, b: Tier) -> Vec<Tier> {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Tier::ALL
            .into_iter()
            .filter(|t| *t >= low && *t <= high)
            .collect()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PartyError {
    #[error("A party has 2, 3 or 5 players")]
    InvalidSize,

    #[error("You're already in this party")]
    AlreadyJoined,

    #[error("This party is full")]
    Full,

    #[error("You're not in this party")]
    NotJoined,

    #[error("This party is no longer open")]
    UnknownParty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub leader: u64,
    pub size: usize,
    pub min_tier: Tier,
    pub max_tier: Tier,
    pub voice_channel: Option<u64>,
    pub voice_invite: Option<String>,
    pub created_at: DateTime<Utc>,
    members: Vec<u64>,
}

impl Party {
    pub fn new(
        leader: u64,
        size: usize,
        a: Tier,
        b: Tier,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PartyError> {
        if !PARTY_SIZES.contains(&size) {
            return Err(PartyError::InvalidSize);
        }
        let (min_tier, max_tier) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self {
            leader,
            size,
            min_tier,
            max_tier,
            voice_channel: None,
            voice_invite: None,
            created_at,
            members: vec![leader],
        })
    }

    pub fn members(&self) -> &[u64] {
        &self.members
    }

    pub fn remaining(&self) -> usize {
        self.size.saturating_sub(self.members.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn tiers(&self) -> Vec<Tier> {
        Tier::range(self.min_tier, self.max_tier)
    }

    pub fn join(&mut self, user_id: u64) -> Result<(), PartyError> {
        if self.members.contains(&user_id) {
            return Err(PartyError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(PartyError::Full);
        }
        self.members.push(user_id);
        Ok(())
    }

    pub fn leave(&mut self, user_id: u64) -> Result<(), PartyError> {
        let before = self.members.len();
        self.members.retain(|m| *m != user_id);
        if self.members.len() == before {
            return Err(PartyError::NotJoined);
        }
        Ok(())
    }
}

/// Open parties by the message that announces them.
#[derive(Default)]
pub struct PartyBoard {
    parties: DashMap<u64, Party>,
}

impl PartyBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, message_id: u64, party: Party) {
        let cutoff = party.created_at - Duration::hours(PARTY_RETENTION_HOURS);
        self.parties.retain(|_, p| p.created_at > cutoff);
        self.parties.insert(message_id, party);
    }

    /// Apply `f` to the party posted as `message_id` and return the new state.
    fn update(
        &self,
        message_id: u64,
        f: impl FnOnce(&mut Party) -> Result<(), PartyError>,
    ) -> Result<Party, PartyError> {
        let mut party = self
            .parties
            .get_mut(&message_id)
            .ok_or(PartyError::UnknownParty)?;
        f(&mut party)?;
        Ok(party.clone())
    }

    pub fn join(&self, message_id: u64, user_id: u64) -> Result<Party, PartyError> {
        self.update(message_id, |p| p.join(user_id))
    }

    pub fn leave(&self, message_id: u64, user_id: u64) -> Result<Party, PartyError> {
        self.update(message_id, |p| p.leave(user_id))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.parties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(size: usize) -> Party {
        Party::new(1, size, Tier::Platinum, Tier::Silver, Utc::now()).unwrap()
    }

    #[test]
    fn tier_range_is_ordered_either_way() {
        let p = party(5);
        assert_eq!(p.min_tier, Tier::Silver);
        assert_eq!(p.max_tier, Tier::Platinum);
        assert_eq!(p.tiers(), vec![Tier::Silver, Tier::Gold, Tier::Platinum]);
        assert_eq!(Tier::range(Tier::Radiant, Tier::Radiant), vec![Tier::Radiant]);
    }

    #[test]
    fn only_known_sizes() {
        assert_eq!(
            Party::new(1, 4, Tier::Iron, Tier::Gold, Utc::now()),
            Err(PartyError::InvalidSize)
        );
    }

    #[test]
    fn join_until_full_then_leave_reopens() {
        let mut p = party(3);
        assert_eq!(p.remaining(), 2);

        p.join(2).unwrap();
        assert_eq!(p.join(2), Err(PartyError::AlreadyJoined));
        p.join(3).unwrap();
        assert!(p.is_full());
        assert_eq!(p.join(4), Err(PartyError::Full));

        p.leave(2).unwrap();
        assert_eq!(p.leave(2), Err(PartyError::NotJoined));
        assert_eq!(p.members(), &[1, 3]);
        p.join(4).unwrap();
    }

    #[test]
    fn board_tracks_parties_by_message() {
        let board = PartyBoard::new();
        board.publish(100, party(2));

        let joined = board.join(100, 9).unwrap();
        assert!(joined.is_full());
        assert_eq!(board.join(101, 9), Err(PartyError::UnknownParty));
        assert_eq!(board.leave(100, 9).unwrap().remaining(), 1);
    }

    #[test]
    fn old_parties_are_dropped_on_publish() {
        let board = PartyBoard::new();
        let now = Utc::now();
        let old = Party::new(
            1,
            2,
            Tier::Iron,
            Tier::Iron,
            now - Duration::hours(PARTY_RETENTION_HOURS + 1),
        )
        .unwrap();
        board.publish(1, old);
        board.publish(2, Party::new(2, 2, Tier::Iron, Tier::Iron, now).unwrap());

        assert_eq!(board.len(), 1);
        assert_eq!(board.join(1, 5), Err(PartyError::UnknownParty));
    }
}
