// Discord layer - commands, event handlers and the loops that post to Discord.

#[path = "commands/command_catalog.rs"]
pub mod commands;

pub mod boards;
pub mod events;
pub mod leveling;
pub mod logging;
pub mod tasks;

// Re-export command types for convenience
pub use commands::{Context, Data, Error};
