#[cfg(test)]
mod in_memory_bot_config_store;
mod postgres_bot_config_store;

#[cfg(test)]
pub use in_memory_bot_config_store::InMemoryBotConfigStore;
pub use postgres_bot_config_store::PostgresBotConfigStore;
