//! The shared fast cache: Redis when configured, otherwise an in-process map
//!
//! Nothing stored here is authoritative.  Entries may vanish or expire at any time and callers
//! fall back to the durable store.

use crate::error::CacheError;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{PoisonError, RwLock},
    time::Duration,
};
use tokio::{sync::OnceCell, time::Instant};

#[serenity::async_trait]
pub trait KeyValueCache: Sync + Send {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    /// Store `value`, expiring after `ttl` if given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    /// Remove `key`.  Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Members of the set stored under `key`
    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError>;
    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError>;
    async fn remove_member(&self, key: &str, member: &str) -> Result<(), CacheError>;
}

/// Redis through one shared, self-reconnecting connection, established on first use
pub struct RedisCache {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisCache {
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(manager.clone())
    }
}

#[serenity::async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        match ttl {
            // Redis rejects a zero expiry
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.smembers(key).await?)
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: () = conn.sadd(key, members).await?;
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }
}

enum MemoryValue {
    Plain(String),
    Set(BTreeSet<String>),
}

struct MemoryEntry {
    value: MemoryValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local stand-in for Redis.  Expiry follows tokio's clock.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[serenity::async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                MemoryValue::Plain(value) => Some(value.clone()),
                MemoryValue::Set(_) => None,
            },
            _ => None,
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value: MemoryValue::Plain(value.to_owned()),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                MemoryValue::Set(members) => members.iter().cloned().collect(),
                MemoryValue::Plain(_) => Vec::new(),
            },
            _ => Vec::new(),
        })
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let entry = entries
            .entry(key.to_owned())
            .or_insert_with(|| MemoryEntry {
                value: MemoryValue::Set(BTreeSet::new()),
                expires_at: None,
            });
        // Like redis, writing a set over a string (or a dead entry) starts it afresh.
        if !entry.is_live(now) || !matches!(entry.value, MemoryValue::Set(_)) {
            *entry = MemoryEntry {
                value: MemoryValue::Set(BTreeSet::new()),
                expires_at: None,
            };
        }
        if let MemoryValue::Set(set) = &mut entry.value {
            set.extend(members.iter().cloned());
        }
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let emptied = match entries.get_mut(key) {
            Some(MemoryEntry {
                value: MemoryValue::Set(set),
                ..
            }) => {
                set.remove(member);
                set.is_empty()
            }
            _ => false,
        };
        if emptied {
            entries.remove(key);
        }
        Ok(())
    }
}
