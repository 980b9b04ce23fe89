mod blocked;
mod cache;
mod config;
mod context;
mod db;
mod error;
mod event;
mod guild_config;
mod handler;
mod helper;
mod logging;
mod persistent_state;
mod plugin;
mod storage;
mod volatile_state;

use crate::cache::{KeyValueCache, MemoryCache, RedisCache};
use serenity::{all::GatewayIntents, Client};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();

    let db = crate::db::connect(&cfg.postgres).await?;
    log_internal!("Connected to Postgres");

    let cache: Arc<dyn KeyValueCache> = match &cfg.redis.url {
        Some(url) => {
            log_internal!("Using Redis for the fast cache");
            Arc::new(RedisCache::open(url)?)
        }
        None => {
            log_internal!("No Redis configured, using an in-memory fast cache");
            Arc::new(MemoryCache::new())
        }
    };

    let blocklist = crate::blocked::BlockList::new(
        Arc::new(crate::db::PgBlockRecords::new(db.clone())),
        cache.clone(),
        cfg.redis.cache_namespace(),
        cfg.blocked.cache_ttl(),
        cfg.blocked.lookup_timeout(),
    );
    let guilds = crate::guild_config::GuildSettings::new(cache, cfg.redis.namespace.clone());

    let pstate = crate::persistent_state::PersistentState::load(&cfg.storage_directory()?).await?;
    let vstate = crate::volatile_state::VolatileState::new();

    let shutdown = Arc::new(Notify::new());
    let handler = handler::Handler::new(
        cfg,
        pstate,
        vstate,
        blocklist,
        guilds,
        db,
        shutdown.clone(),
    );

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown.notified().await;
        log_internal!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    client.start().await.map_err(Into::into)
}
