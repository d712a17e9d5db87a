mod betting_service;
pub mod prediction;

pub use betting_service::{BettingError, BettingService, PredictionOutcome};
pub use prediction::{Prediction, Side};
