// Economy infrastructure - Postgres storage implementation

#[cfg(test)]
mod in_memory_coin_store;
mod postgres_coin_store;

#[cfg(test)]
pub use in_memory_coin_store::InMemoryCoinStore;
pub use postgres_coin_store::PostgresCoinStore;
