mod board_service;

pub use board_service::{
    BoardError, BoardService, BotConfigStore, RefreshGate, COIN_LEADERBOARD, DAILY_COINS_PANEL,
    DAILY_XP_PANEL, MMR_LEADERBOARD, XP_LEADERBOARD,
};
