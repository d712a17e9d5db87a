// Holds the single active custom game and applies lobby actions to it.

use super::lobby::{DueReminders, Lobby, LobbyError};
use crate::core::timezones::{TimezoneDisplay, TimezoneError, TimezoneService};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::Mutex;

pub const MAPS: [&str; 7] = [
    "Ascent", "Haven", "Icebox", "Lotus", "Pearl", "Split", "Sunset",
];

#[derive(Debug, Error, PartialEq)]
pub enum CustomGameError {
    #[error("There is no active custom game")]
    NoActiveGame,

    #[error("A custom game is already open")]
    AlreadyActive,

    #[error("You don't have permission to do that")]
    NotPrivileged,

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    #[error(transparent)]
    Time(#[from] TimezoneError),
}

/// Reminder work for the discord layer: who to ping and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderBatch {
    pub channel_id: u64,
    pub members: Vec<u64>,
    pub due: DueReminders,
}

pub struct CustomGameService {
    lobby: Mutex<Option<Lobby>>,
    timezones: TimezoneService,
    admin_roles: Vec<u64>,
    rng: std::sync::Mutex<StdRng>,
}

impl CustomGameService {
    pub fn new(admin_roles: Vec<u64>) -> Self {
        Self::with_rng(admin_roles, StdRng::from_entropy())
    }

    pub fn with_rng(admin_roles: Vec<u64>, rng: StdRng) -> Self {
        Self {
            lobby: Mutex::new(None),
            timezones: TimezoneService::new(),
            admin_roles,
            rng: std::sync::Mutex::new(rng),
        }
    }

    pub fn format_start(&self, starts_at: DateTime<Utc>) -> Vec<TimezoneDisplay> {
        self.timezones.format_in_zones(starts_at)
    }

    /// Open a new lobby starting at `time` in `zone` (est/cst/pst).
    pub async fn open(
        &self,
        creator_id: u64,
        channel_id: u64,
        time: &str,
        zone: &str,
        now: DateTime<Utc>,
    ) -> Result<Lobby, CustomGameError> {
        let starts_at = self.timezones.parse_start_time(time, zone, now)?;

        let mut slot = self.lobby.lock().await;
        if slot.is_some() {
            return Err(CustomGameError::AlreadyActive);
        }
        let lobby = Lobby::new(creator_id, channel_id, starts_at);
        *slot = Some(lobby.clone());

        tracing::info!(creator_id, %starts_at, "Custom game opened");
        Ok(lobby)
    }

    pub async fn current(&self) -> Option<Lobby> {
        self.lobby.lock().await.clone()
    }

    /// Apply `f` to the active lobby and return the updated copy with its
    /// result.
    async fn update<T>(
        &self,
        f: impl FnOnce(&mut Lobby) -> Result<T, CustomGameError>,
    ) -> Result<(Lobby, T), CustomGameError> {
        let mut slot = self.lobby.lock().await;
        let lobby = slot.as_mut().ok_or(CustomGameError::NoActiveGame)?;
        let value = f(lobby)?;
        Ok((lobby.clone(), value))
    }

    fn require_privileged(
        &self,
        lobby: &Lobby,
        user_id: u64,
        roles: &[u64],
    ) -> Result<(), CustomGameError> {
        if lobby.is_privileged(user_id, roles, &self.admin_roles) {
            Ok(())
        } else {
            Err(CustomGameError::NotPrivileged)
        }
    }

    pub async fn set_message(&self, message_id: u64) -> Result<(), CustomGameError> {
        self.update(|lobby| {
            lobby.message_id = Some(message_id);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    pub async fn join(&self, user_id: u64) -> Result<Lobby, CustomGameError> {
        let (lobby, _) = self.update(|l| Ok(l.join(user_id)?)).await?;
        Ok(lobby)
    }

    /// Returns the member promoted from the waitlist, if any.
    pub async fn leave(&self, user_id: u64) -> Result<(Lobby, Option<u64>), CustomGameError> {
        self.update(|l| Ok(l.leave(user_id)?)).await
    }

    pub async fn join_waitlist(&self, user_id: u64) -> Result<Lobby, CustomGameError> {
        let (lobby, _) = self.update(|l| Ok(l.join_waitlist(user_id)?)).await?;
        Ok(lobby)
    }

    pub async fn leave_waitlist(&self, user_id: u64) -> Result<Lobby, CustomGameError> {
        let (lobby, _) = self.update(|l| Ok(l.leave_waitlist(user_id)?)).await?;
        Ok(lobby)
    }

    pub async fn open_waitlist(
        &self,
        user_id: u64,
        roles: &[u64],
    ) -> Result<Lobby, CustomGameError> {
        let (lobby, _) = self
            .update(|l| {
                self.require_privileged(l, user_id, roles)?;
                Ok(l.open_waitlist()?)
            })
            .await?;
        Ok(lobby)
    }

    pub async fn fill_placeholders(
        &self,
        user_id: u64,
        roles: &[u64],
    ) -> Result<(Lobby, usize), CustomGameError> {
        self.update(|l| {
            self.require_privileged(l, user_id, roles)?;
            Ok(l.fill_placeholders()?)
        })
        .await
    }

    pub async fn roll_map(&self, user_id: u64, roles: &[u64]) -> Result<&'static str, CustomGameError> {
        {
            let slot = self.lobby.lock().await;
            let lobby = slot.as_ref().ok_or(CustomGameError::NoActiveGame)?;
            self.require_privileged(lobby, user_id, roles)?;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Ok(MAPS.choose(&mut *rng).copied().unwrap_or(MAPS[0]))
    }

    /// Cancel the active lobby. Only the creator or an admin may do this.
    pub async fn cancel(&self, user_id: u64, roles: &[u64]) -> Result<Lobby, CustomGameError> {
        let mut slot = self.lobby.lock().await;
        let lobby = slot.as_ref().ok_or(CustomGameError::NoActiveGame)?;
        self.require_privileged(lobby, user_id, roles)?;

        tracing::info!(user_id, "Custom game cancelled");
        slot.take().ok_or(CustomGameError::NoActiveGame)
    }

    /// Drop the lobby once the game has been played.
    pub async fn close(&self) -> Option<Lobby> {
        self.lobby.lock().await.take()
    }

    pub async fn poll_reminders(&self, now: DateTime<Utc>) -> Option<ReminderBatch> {
        let mut slot = self.lobby.lock().await;
        let lobby = slot.as_mut()?;
        let due = lobby.poll_reminders(now);
        if due == DueReminders::default() {
            return None;
        }
        Some(ReminderBatch {
            channel_id: lobby.channel_id,
            members: lobby.member_ids(),
            due,
        })
    }
}
