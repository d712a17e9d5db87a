// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "anonymous/mod.rs"]
pub mod anonymous;

#[path = "autobalance/mod.rs"]
pub mod autobalance;

#[path = "betting/mod.rs"]
pub mod betting;

#[path = "boards/mod.rs"]
pub mod boards;

#[path = "casino/mod.rs"]
pub mod casino;

#[path = "crash/mod.rs"]
pub mod crash;

#[path = "custom_game/mod.rs"]
pub mod custom_game;

#[path = "economy/mod.rs"]
pub mod economy;

#[path = "entry/mod.rs"]
pub mod entry;

#[path = "leveling/leveling_service.rs"]
pub mod leveling;

#[path = "party/mod.rs"]
pub mod party;

#[path = "reactions/mod.rs"]
pub mod reactions;

#[path = "shop/mod.rs"]
pub mod shop;

#[path = "tickets/mod.rs"]
pub mod tickets;

#[path = "timezones/timezone_service.rs"]
pub mod timezones;

#[path = "valorant/mod.rs"]
pub mod valorant;

#[path = "voice/mod.rs"]
pub mod voice;
