mod henrik_models;
pub mod rating;
mod valorant_service;

pub use henrik_models::{AccountData, HenrikEnvelope, MatchData, MmrData};
pub use rating::{HiddenRating, MatchLine};
pub use valorant_service::{
    parse_riot_id, HenrikApi, MatchPlayerRow, MmrUpdate, Player, PlayerStore, RankReport,
    RefreshProgress, RefreshSummary, RiotIdChange, SeedReport, ValorantError, ValorantService,
};
