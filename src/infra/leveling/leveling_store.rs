// Implementations for the leveling system.

#[cfg(test)]
pub mod in_memory;
pub mod postgres_xp_store;

#[cfg(test)]
pub use in_memory::InMemoryXpStore;
pub use postgres_xp_store::PostgresXpStore;
