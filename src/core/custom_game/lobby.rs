// The custom game lobby: ten seats, an optional waitlist and the reminder
// schedule leading up to the start time.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub const LOBBY_CAPACITY: usize = 10;
pub const WARNING_LEAD_MINUTES: i64 = 30;
/// Voice-channel check pings, in minutes before the start.
pub const VOICE_CHECK_MARKS: [i64; 3] = [10, 5, 1];

#[derive(Debug, Error, PartialEq)]
pub enum LobbyError {
    #[error("You already joined")]
    AlreadyJoined,

    #[error("You haven't joined")]
    NotJoined,

    #[error("The lobby is full, join the waitlist instead")]
    LobbyFull,

    #[error("The lobby still has free seats")]
    SeatsAvailable,

    #[error("The waitlist is not open")]
    WaitlistClosed,

    #[error("The waitlist is already open")]
    WaitlistAlreadyOpen,

    #[error("You are already in the lobby or on the waitlist")]
    AlreadyQueued,

    #[error("You are not on the waitlist")]
    NotQueued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Member(u64),
    /// Filler seat added by an admin.
    Placeholder(String),
}

impl Participant {
    pub fn mention(&self) -> String {
        match self {
            Participant::Member(id) => format!("<@{id}>"),
            Participant::Placeholder(name) => format!("`{name}`"),
        }
    }

    pub fn member_id(&self) -> Option<u64> {
        match self {
            Participant::Member(id) => Some(*id),
            Participant::Placeholder(_) => None,
        }
    }
}

/// Reminders that became due on a poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DueReminders {
    pub warning: bool,
    pub voice_check: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Lobby {
    pub creator_id: u64,
    pub channel_id: u64,
    pub starts_at: DateTime<Utc>,
    pub message_id: Option<u64>,
    participants: Vec<Participant>,
    waitlist_open: bool,
    waitlist: Vec<u64>,
    warning_sent: bool,
    marks_fired: Vec<i64>,
}

impl Lobby {
    pub fn new(creator_id: u64, channel_id: u64, starts_at: DateTime<Utc>) -> Self {
        Self {
            creator_id,
            channel_id,
            starts_at,
            message_id: None,
            participants: Vec::new(),
            waitlist_open: false,
            waitlist: Vec::new(),
            warning_sent: false,
            marks_fired: Vec::new(),
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn waitlist(&self) -> &[u64] {
        &self.waitlist
    }

    pub fn waitlist_open(&self) -> bool {
        self.waitlist_open
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= LOBBY_CAPACITY
    }

    pub fn member_ids(&self) -> Vec<u64> {
        self.participants
            .iter()
            .filter_map(Participant::member_id)
            .collect()
    }

    fn has_member(&self, user_id: u64) -> bool {
        self.participants
            .iter()
            .any(|p| p.member_id() == Some(user_id))
    }

    /// Creator, or anyone holding one of the admin roles.
    pub fn is_privileged(&self, user_id: u64, roles: &[u64], admin_roles: &[u64]) -> bool {
        user_id == self.creator_id || roles.iter().any(|r| admin_roles.contains(r))
    }

    pub fn join(&mut self, user_id: u64) -> Result<(), LobbyError> {
        if self.has_member(user_id) {
            return Err(LobbyError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(LobbyError::LobbyFull);
        }
        self.participants.push(Participant::Member(user_id));
        Ok(())
    }

    /// Leave the lobby. The head of the waitlist takes the free seat and is
    /// returned.
    pub fn leave(&mut self, user_id: u64) -> Result<Option<u64>, LobbyError> {
        let index = self
            .participants
            .iter()
            .position(|p| p.member_id() == Some(user_id))
            .ok_or(LobbyError::NotJoined)?;
        self.participants.remove(index);

        if self.waitlist.is_empty() {
            return Ok(None);
        }
        let next = self.waitlist.remove(0);
        self.participants.push(Participant::Member(next));
        Ok(Some(next))
    }

    pub fn open_waitlist(&mut self) -> Result<(), LobbyError> {
        if self.waitlist_open {
            return Err(LobbyError::WaitlistAlreadyOpen);
        }
        self.waitlist_open = true;
        Ok(())
    }

    pub fn join_waitlist(&mut self, user_id: u64) -> Result<(), LobbyError> {
        if !self.waitlist_open {
            return Err(LobbyError::WaitlistClosed);
        }
        if self.has_member(user_id) || self.waitlist.contains(&user_id) {
            return Err(LobbyError::AlreadyQueued);
        }
        if !self.is_full() {
            return Err(LobbyError::SeatsAvailable);
        }
        self.waitlist.push(user_id);
        Ok(())
    }

    pub fn leave_waitlist(&mut self, user_id: u64) -> Result<(), LobbyError> {
        let index = self
            .waitlist
            .iter()
            .position(|id| *id == user_id)
            .ok_or(LobbyError::NotQueued)?;
        self.waitlist.remove(index);
        Ok(())
    }

    /// Fill the empty seats with `Player1`, `Player2`... Returns how many
    /// were added.
    pub fn fill_placeholders(&mut self) -> Result<usize, LobbyError> {
        let needed = LOBBY_CAPACITY.saturating_sub(self.participants.len());
        if needed == 0 {
            return Err(LobbyError::LobbyFull);
        }
        for n in 1..=needed {
            self.participants
                .push(Participant::Placeholder(format!("Player{n}")));
        }
        Ok(needed)
    }

    /// Work out which reminders fire now. Each fires at most once; when
    /// several voice checks are overdue only the nearest one is reported.
    pub fn poll_reminders(&mut self, now: DateTime<Utc>) -> DueReminders {
        let mut due = DueReminders::default();
        let remaining = self.starts_at - now;
        if remaining <= Duration::zero() {
            return due;
        }

        if !self.warning_sent && remaining <= Duration::minutes(WARNING_LEAD_MINUTES) {
            self.warning_sent = true;
            due.warning = true;
        }

        for mark in VOICE_CHECK_MARKS {
            if remaining <= Duration::minutes(mark) && !self.marks_fired.contains(&mark) {
                self.marks_fired.push(mark);
                due.voice_check = Some(mark);
            }
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Lobby {
        let start = DateTime::parse_from_rfc3339("2024-06-02T01:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Lobby::new(1, 500, start)
    }

    #[test]
    fn seats_are_capped_at_ten() {
        let mut lobby = lobby();
        for user in 10..20 {
            lobby.join(user).unwrap();
        }
        assert!(lobby.is_full());
        assert_eq!(lobby.join(99), Err(LobbyError::LobbyFull));
        assert_eq!(lobby.join(10), Err(LobbyError::AlreadyJoined));
    }

    #[test]
    fn leaving_promotes_the_waitlist_head() {
        let mut lobby = lobby();
        for user in 10..20 {
            lobby.join(user).unwrap();
        }
        assert_eq!(lobby.join_waitlist(30), Err(LobbyError::WaitlistClosed));
        lobby.open_waitlist().unwrap();
        assert_eq!(lobby.open_waitlist(), Err(LobbyError::WaitlistAlreadyOpen));

        lobby.join_waitlist(30).unwrap();
        lobby.join_waitlist(31).unwrap();
        assert_eq!(lobby.join_waitlist(30), Err(LobbyError::AlreadyQueued));
        assert_eq!(lobby.join_waitlist(12), Err(LobbyError::AlreadyQueued));

        assert_eq!(lobby.leave(12), Ok(Some(30)));
        assert_eq!(lobby.waitlist(), &[31]);
        assert!(lobby.member_ids().contains(&30));

        lobby.leave_waitlist(31).unwrap();
        assert_eq!(lobby.leave(13), Ok(None));
        assert_eq!(lobby.leave(13), Err(LobbyError::NotJoined));
    }

    #[test]
    fn placeholders_fill_remaining_seats() {
        let mut lobby = lobby();
        lobby.join(10).unwrap();
        lobby.join(11).unwrap();

        assert_eq!(lobby.fill_placeholders(), Ok(8));
        assert!(lobby.is_full());
        assert_eq!(lobby.participants()[2].mention(), "`Player1`");
        assert_eq!(lobby.participants()[9].mention(), "`Player8`");
        assert_eq!(lobby.member_ids(), vec![10, 11]);
        assert_eq!(lobby.fill_placeholders(), Err(LobbyError::LobbyFull));
    }

    #[test]
    fn privilege_is_creator_or_admin_role() {
        let lobby = lobby();
        assert!(lobby.is_privileged(1, &[], &[77]));
        assert!(lobby.is_privileged(2, &[5, 77], &[77]));
        assert!(!lobby.is_privileged(2, &[5], &[77]));
    }

    #[test]
    fn reminders_fire_once_each() {
        let mut lobby = lobby();
        let at = |minutes_before: i64| lobby_start() - Duration::minutes(minutes_before);

        assert_eq!(lobby.poll_reminders(at(45)), DueReminders::default());

        let due = lobby.poll_reminders(at(30));
        assert!(due.warning);
        assert_eq!(due.voice_check, None);
        assert!(!lobby.poll_reminders(at(29)).warning);

        assert_eq!(lobby.poll_reminders(at(10)).voice_check, Some(10));
        assert_eq!(lobby.poll_reminders(at(9)).voice_check, None);
        assert_eq!(lobby.poll_reminders(at(5)).voice_check, Some(5));
        assert_eq!(lobby.poll_reminders(at(1)).voice_check, Some(1));
        assert_eq!(lobby.poll_reminders(at(0)), DueReminders::default());
    }

    #[test]
    fn late_lobbies_skip_stale_voice_checks() {
        let mut lobby = lobby();
        let due = lobby.poll_reminders(lobby_start() - Duration::minutes(3));
        assert!(due.warning);
        assert_eq!(due.voice_check, Some(5));
        assert_eq!(
            lobby.poll_reminders(lobby_start() - Duration::seconds(30)).voice_check,
            Some(1)
        );
    }

    fn lobby_start() -> DateTime<Utc> {
        lobby().starts_at
    }
}
