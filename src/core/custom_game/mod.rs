mod custom_game_service;
mod lobby;

pub use custom_game_service::{CustomGameError, CustomGameService, ReminderBatch, MAPS};
pub use lobby::{DueReminders, Lobby, LobbyError, Participant, LOBBY_CAPACITY};
