//! Whether a user is blocked from talking to the bot
//!
//! The durable store is authoritative.  Answers are memoized in the fast cache for a fixed TTL,
//! and every block/unblock flushes the user's cache entry before it is acknowledged.

use crate::{cache::KeyValueCache, error::BlockError, log_error, log_internal};
use chrono::{DateTime, Utc};
use serenity::all::UserId;
use std::{sync::Arc, time::Duration};

const CACHED_BLOCKED: &str = "yes";
const CACHED_NOT_BLOCKED: &str = "no";

/// Why and by whom a user was blocked
#[derive(Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub user_id: UserId,
    pub reason: Option<String>,
    pub blocked_by: UserId,
    pub blocked_at: DateTime<Utc>,
}

/// Authoritative storage of block records
#[serenity::async_trait]
pub trait BlockRecords: Sync + Send {
    async fn find(&self, user_id: UserId) -> Result<Option<BlockRecord>, BlockError>;
    /// Insert the record, or replace the reason if the user is already blocked
    async fn upsert(&self, record: &BlockRecord) -> Result<(), BlockError>;
    /// Returns whether a record was removed
    async fn remove(&self, user_id: UserId) -> Result<bool, BlockError>;
}

/// Whether a message author may be served at all
#[derive(Debug)]
pub enum Admission {
    Admitted,
    /// Bots are never served
    Bot,
    Blocked,
    /// The blocked status could not be determined, so the author is turned away
    Unvetted(BlockError),
}

pub struct BlockList {
    records: Arc<dyn BlockRecords>,
    cache: Arc<dyn KeyValueCache>,
    namespace: String,
    ttl: Duration,
    lookup_timeout: Duration,
}

impl BlockList {
    pub fn new(
        records: Arc<dyn BlockRecords>,
        cache: Arc<dyn KeyValueCache>,
        namespace: impl Into<String>,
        ttl: Duration,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            records,
            cache,
            namespace: namespace.into(),
            ttl,
            lookup_timeout,
        }
    }

    pub fn cache_key(&self, user_id: UserId) -> String {
        format!("{}:blocked:{}", self.namespace, user_id)
    }

    pub async fn is_blocked(&self, user_id: UserId) -> Result<bool, BlockError> {
        let key = self.cache_key(user_id);

        match self.cache.get(&key).await {
            Ok(Some(value)) => return Ok(value == CACHED_BLOCKED),
            Ok(None) => {}
            // The cache only saves us a query; carry on without it.
            Err(e) => log_error!("Could not read `{}` for user {}: {}", key, user_id, e),
        }

        let blocked = self.find(user_id).await?.is_some();

        let value = if blocked {
            CACHED_BLOCKED
        } else {
            CACHED_NOT_BLOCKED
        };
        if let Err(e) = self.cache.set(&key, value, Some(self.ttl)).await {
            log_error!("Could not cache `{}` for user {}: {}", key, user_id, e);
        }

        Ok(blocked)
    }

    /// Vet a message author.  Runs before anything else looks at the message.
    pub async fn admit(&self, user_id: UserId, bot: bool) -> Admission {
        if bot {
            return Admission::Bot;
        }
        match self.is_blocked(user_id).await {
            Ok(false) => Admission::Admitted,
            Ok(true) => Admission::Blocked,
            Err(e) => Admission::Unvetted(e),
        }
    }

    /// Forget the cached status so the next lookup asks the durable store
    pub async fn invalidate(&self, user_id: UserId) -> Result<(), BlockError> {
        log_internal!("Flushing blocked status for {}", user_id);
        self.cache
            .delete(&self.cache_key(user_id))
            .await
            .map_err(Into::into)
    }

    pub async fn block(
        &self,
        user_id: UserId,
        reason: Option<String>,
        blocked_by: UserId,
    ) -> Result<(), BlockError> {
        let record = BlockRecord {
            user_id,
            reason,
            blocked_by,
            blocked_at: Utc::now(),
        };
        self.records.upsert(&record).await?;
        self.invalidate(user_id).await
    }

    /// Returns whether the user was blocked to begin with
    pub async fn unblock(&self, user_id: UserId) -> Result<bool, BlockError> {
        let removed = self.records.remove(user_id).await?;
        self.invalidate(user_id).await?;
        Ok(removed)
    }

    /// The durable record, bypassing the cache
    pub async fn info(&self, user_id: UserId) -> Result<Option<BlockRecord>, BlockError> {
        self.find(user_id).await
    }

    async fn find(&self, user_id: UserId) -> Result<Option<BlockRecord>, BlockError> {
        tokio::time::timeout(self.lookup_timeout, self.records.find(user_id))
            .await
            .map_err(|_| BlockError::Timeout(self.lookup_timeout))?
    }
}
