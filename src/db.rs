//! Postgres: connection pool, migrations and the queries the bot runs

use crate::{
    blocked::{BlockRecord, BlockRecords},
    config,
    error::BlockError,
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serenity::all::UserId;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

pub async fn connect(cfg: &config::Postgres) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout())
        .connect(&cfg.url)
        .await
        .map_err(|e| anyhow!("Could not connect to Postgres: {}", e))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow!("Could not run migrations: {}", e))?;

    Ok(pool)
}

#[derive(FromRow)]
struct BlockedUserRow {
    user_id: i64,
    block_reason: Option<String>,
    blocked_by: i64,
    blocked_at: DateTime<Utc>,
}

impl From<BlockedUserRow> for BlockRecord {
    fn from(row: BlockedUserRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id as u64),
            reason: row.block_reason,
            blocked_by: UserId::new(row.blocked_by as u64),
            blocked_at: row.blocked_at,
        }
    }
}

/// Block records in the `blocked_users` table
pub struct PgBlockRecords {
    pool: PgPool,
}

impl PgBlockRecords {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[serenity::async_trait]
impl BlockRecords for PgBlockRecords {
    async fn find(&self, user_id: UserId) -> Result<Option<BlockRecord>, BlockError> {
        let row = sqlx::query_as::<_, BlockedUserRow>(
            "SELECT user_id, block_reason, blocked_by, blocked_at
             FROM blocked_users
             WHERE user_id = $1",
        )
        .bind(user_id.get() as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, record: &BlockRecord) -> Result<(), BlockError> {
        sqlx::query(
            "INSERT INTO blocked_users (user_id, block_reason, blocked_by, blocked_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id) DO UPDATE SET block_reason = $2",
        )
        .bind(record.user_id.get() as i64)
        .bind(&record.reason)
        .bind(record.blocked_by.get() as i64)
        .bind(record.blocked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, user_id: UserId) -> Result<bool, BlockError> {
        let result = sqlx::query("DELETE FROM blocked_users WHERE user_id = $1")
            .bind(user_id.get() as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// A guild message as written to the `messages` table
pub struct LoggedMessage<'a> {
    pub id: u64,
    pub content: &'a str,
    pub created_at: DateTime<Utc>,
    pub author_id: u64,
    pub author_tag: &'a str,
    pub channel_id: u64,
    pub channel_name: &'a str,
    pub guild_id: u64,
    pub guild_name: &'a str,
}

pub async fn log_message(pool: &PgPool, msg: &LoggedMessage<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages
         (id, content, created_at, author_id, author_tag, channel_id, channel_name, guild_id, guild_name)
         VALUES
         ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(msg.id as i64)
    .bind(msg.content)
    .bind(msg.created_at)
    .bind(msg.author_id as i64)
    .bind(msg.author_tag)
    .bind(msg.channel_id as i64)
    .bind(msg.channel_name)
    .bind(msg.guild_id as i64)
    .bind(msg.guild_name)
    .execute(pool)
    .await?;

    Ok(())
}
