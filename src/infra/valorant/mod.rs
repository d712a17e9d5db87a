// Valorant infrastructure - Henrik API client and Postgres player storage

mod henrik_client;
#[cfg(test)]
mod in_memory_player_store;
mod postgres_player_store;

pub use henrik_client::HenrikClient;
#[cfg(test)]
pub use in_memory_player_store::InMemoryPlayerStore;
pub use postgres_player_store::PostgresPlayerStore;
