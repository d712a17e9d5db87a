// Economy module - domain logic for the server coin currency

mod economy_service;

pub use economy_service::{
    BalanceAction, BalanceChange, CoinLeaderboardPage, CoinStore, DailyClaimOutcome,
    EconomyConfig, EconomyError, EconomyService, Settlement, TransferReceipt,
};
