mod board_publisher;

pub use board_publisher::{
    handle_daily_button, panels, post_daily_panels, refresh_coin_board, refresh_mmr_board,
    refresh_xp_board, BoardGates, DAILY_COINS_BUTTON, DAILY_XP_BUTTON,
};
