// Postgres implementation of the PlayerStore trait

use crate::core::valorant::{
    HiddenRating, MatchPlayerRow, MmrUpdate, Player, PlayerStore, ValorantError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::collections::HashSet;

pub struct PostgresPlayerStore {
    pool: PgPool,
}

fn store_err(e: sqlx::Error) -> ValorantError {
    ValorantError::StorageError(e.to_string())
}

const PLAYER_COLUMNS: &str = "discord_id, puuid, riot_name, riot_tag, discord_nick, \
     competitive_mmr, hidden_win_mmr, hidden_win_rd, hidden_win_vol, hidden_enc_mmr, \
     visible_mmr, seeded, last_active";

fn player_from_row(row: &PgRow) -> Result<Player, sqlx::Error> {
    Ok(Player {
        discord_id: row.try_get::<i64, _>("discord_id")? as u64,
        puuid: row.try_get("puuid")?,
        riot_name: row.try_get("riot_name")?,
        riot_tag: row.try_get("riot_tag")?,
        discord_nick: row.try_get("discord_nick")?,
        competitive_mmr: row.try_get("competitive_mmr")?,
        hidden: HiddenRating {
            win_mmr: row.try_get("hidden_win_mmr")?,
            rd: row.try_get("hidden_win_rd")?,
            volatility: row.try_get("hidden_win_vol")?,
            encounter_mmr: row.try_get("hidden_enc_mmr")?,
        },
        visible_mmr: row.try_get("visible_mmr")?,
        seeded: row.try_get("seeded")?,
        last_active: row.try_get::<DateTime<Utc>, _>("last_active")?,
    })
}

impl PostgresPlayerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the player and match tables if they don't exist yet.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                discord_id BIGINT PRIMARY KEY,
                puuid TEXT UNIQUE NOT NULL,
                riot_name TEXT NOT NULL,
                riot_tag TEXT NOT NULL,
                discord_nick TEXT,
                competitive_mmr INTEGER NOT NULL DEFAULT 1000,
                hidden_win_mmr INTEGER NOT NULL DEFAULT 1000,
                hidden_win_rd DOUBLE PRECISION NOT NULL DEFAULT 350,
                hidden_win_vol DOUBLE PRECISION NOT NULL DEFAULT 0.06,
                hidden_enc_mmr INTEGER NOT NULL DEFAULT 1000,
                visible_mmr INTEGER NOT NULL DEFAULT 1000,
                seeded BOOLEAN NOT NULL DEFAULT FALSE,
                last_active TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS match_players (
                match_id TEXT NOT NULL,
                puuid TEXT NOT NULL,
                riot_name TEXT,
                riot_tag TEXT,
                map TEXT,
                agent TEXT,
                kda TEXT,
                kills INTEGER,
                deaths INTEGER,
                assists INTEGER,
                score INTEGER,
                adr BIGINT,
                hs_pct DOUBLE PRECISION,
                team TEXT,
                won BOOLEAN,
                round_count INTEGER,
                team1_score INTEGER,
                team2_score INTEGER,
                tier TEXT,
                game_start TIMESTAMPTZ,
                UNIQUE (match_id, puuid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS analyzed_matches (match_id TEXT PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_players(&self, sql: &str, limit: Option<i64>) -> Result<Vec<Player>, ValorantError> {
        let mut query = sqlx::query(sql);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(store_err)?;
        rows.iter()
            .map(player_from_row)
            .collect::<Result<_, _>>()
            .map_err(store_err)
    }
}

#[async_trait]
impl PlayerStore for PostgresPlayerStore {
    async fn upsert_link(
        &self,
        discord_id: u64,
        puuid: &str,
        riot_name: &str,
        riot_tag: &str,
    ) -> Result<(), ValorantError> {
        sqlx::query(
            r#"
            INSERT INTO players (discord_id, puuid, riot_name, riot_tag, seeded, last_active, created_at)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
            ON CONFLICT (discord_id) DO UPDATE SET
                puuid = EXCLUDED.puuid,
                riot_name = EXCLUDED.riot_name,
                riot_tag = EXCLUDED.riot_tag,
                seeded = TRUE,
                last_active = NOW()
            "#,
        )
        .bind(discord_id as i64)
        .bind(puuid)
        .bind(riot_name)
        .bind(riot_tag)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn player(&self, discord_id: u64) -> Result<Option<Player>, ValorantError> {
        let row = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE discord_id = $1"
        ))
        .bind(discord_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref()
            .map(player_from_row)
            .transpose()
            .map_err(store_err)
    }

    async fn all_players(&self) -> Result<Vec<Player>, ValorantError> {
        self.fetch_players(
            &format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY discord_id"),
            None,
        )
        .await
    }

    async fn linked_puuids(&self) -> Result<HashSet<String>, ValorantError> {
        let puuids: Vec<String> = sqlx::query_scalar("SELECT puuid FROM players")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(puuids.into_iter().collect())
    }

    async fn update_mmr(&self, puuid: &str, update: &MmrUpdate) -> Result<(), ValorantError> {
        sqlx::query(
            r#"
            UPDATE players SET
                competitive_mmr = $1,
                hidden_win_mmr = $2,
                hidden_win_rd = $3,
                hidden_win_vol = $4,
                hidden_enc_mmr = $5,
                visible_mmr = $6,
                last_active = NOW()
            WHERE puuid = $7
            "#,
        )
        .bind(update.competitive_mmr)
        .bind(update.hidden.win_mmr)
        .bind(update.hidden.rd)
        .bind(update.hidden.volatility)
        .bind(update.hidden.encounter_mmr)
        .bind(update.visible_mmr)
        .bind(puuid)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn rename(
        &self,
        puuid: &str,
        riot_name: &str,
        riot_tag: &str,
    ) -> Result<(), ValorantError> {
        sqlx::query("UPDATE players SET riot_name = $1, riot_tag = $2 WHERE puuid = $3")
            .bind(riot_name)
            .bind(riot_tag)
            .bind(puuid)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_nick(&self, discord_id: u64, nick: &str) -> Result<bool, ValorantError> {
        let result = sqlx::query("UPDATE players SET discord_nick = $1 WHERE discord_id = $2")
            .bind(nick)
            .bind(discord_id as i64)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn top_by_visible(&self, limit: usize) -> Result<Vec<Player>, ValorantError> {
        self.fetch_players(
            &format!("SELECT {PLAYER_COLUMNS} FROM players ORDER BY visible_mmr DESC LIMIT $1"),
            Some(limit as i64),
        )
        .await
    }

    async fn is_analyzed(&self, match_id: &str) -> Result<bool, ValorantError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT match_id FROM analyzed_matches WHERE match_id = $1")
                .bind(match_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(found.is_some())
    }

    async fn record_match(
        &self,
        match_id: &str,
        rows: &[MatchPlayerRow],
    ) -> Result<(), ValorantError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO match_players (
                    match_id, puuid, riot_name, riot_tag, map, agent,
                    kda, kills, deaths, assists, score, adr, hs_pct,
                    team, won, round_count, team1_score, team2_score,
                    tier, game_start
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                        $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
                ON CONFLICT (match_id, puuid) DO NOTHING
                "#,
            )
            .bind(&row.match_id)
            .bind(&row.puuid)
            .bind(&row.riot_name)
            .bind(&row.riot_tag)
            .bind(&row.map)
            .bind(&row.agent)
            .bind(&row.kda)
            .bind(row.kills)
            .bind(row.deaths)
            .bind(row.assists)
            .bind(row.score)
            .bind(row.adr)
            .bind(row.hs_pct)
            .bind(&row.team)
            .bind(row.won)
            .bind(row.round_count)
            .bind(row.team1_score)
            .bind(row.team2_score)
            .bind(&row.tier)
            .bind(row.game_start)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            sqlx::query("UPDATE players SET last_active = $1 WHERE puuid = $2")
                .bind(row.game_start)
                .bind(&row.puuid)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        sqlx::query(
            "INSERT INTO analyzed_matches (match_id) VALUES ($1) ON CONFLICT (match_id) DO NOTHING",
        )
        .bind(match_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}
