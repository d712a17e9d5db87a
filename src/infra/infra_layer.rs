// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "boards/mod.rs"]
pub mod boards;

#[path = "database.rs"]
pub mod database;

#[path = "economy/mod.rs"]
pub mod economy;

#[path = "google_sheets/mod.rs"]
pub mod google_sheets;

#[path = "leveling/leveling_store.rs"]
pub mod leveling;

#[path = "valorant/mod.rs"]
pub mod valorant;
