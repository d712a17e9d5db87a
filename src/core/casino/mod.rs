// Casino minigames: pure rules in `games` and `blackjack`, balance handling
// in `casino_service`.

pub mod blackjack;
mod casino_service;
pub mod games;

pub use blackjack::{render_cards, BlackjackError, BlackjackGame, HandResult};
pub use casino_service::{CasinoError, CasinoService, RPS_COOLDOWN_SECS};
pub use games::{CoinSide, PocketColor, RpsChoice, RpsResult, SlotsResult};
