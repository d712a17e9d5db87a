// Postgres bootstrap: one pool shared by every store, and all migrations run
// before the bot connects to Discord.

use super::boards::PostgresBotConfigStore;
use super::economy::PostgresCoinStore;
use super::leveling::PostgresXpStore;
use super::valorant::PostgresPlayerStore;
use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub struct Stores {
    pub coins: PostgresCoinStore,
    pub xp: PostgresXpStore,
    pub players: PostgresPlayerStore,
    pub bot_config: PostgresBotConfigStore,
}

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connecting to Postgres")
}

/// Builds every store on the pool and creates missing tables.
pub async fn open_stores(pool: &PgPool) -> anyhow::Result<Stores> {
    let stores = Stores {
        coins: PostgresCoinStore::new(pool.clone()),
        xp: PostgresXpStore::new(pool.clone()),
        players: PostgresPlayerStore::new(pool.clone()),
        bot_config: PostgresBotConfigStore::new(pool.clone()),
    };

    stores.coins.migrate().await.context("coins migration")?;
    stores.xp.migrate().await.context("xp migration")?;
    stores.players.migrate().await.context("players migration")?;
    stores
        .bot_config
        .migrate()
        .await
        .context("bot_config migration")?;

    tracing::info!("database migrations complete");
    Ok(stores)
}
