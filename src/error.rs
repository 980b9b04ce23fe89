//! Error kinds surfaced by the bot's infrastructure and by its commands

use std::{path::PathBuf, time::Duration};

/// Failures of a [`crate::storage::JsonStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `delete` on a key that is not present.  Callers usually treat this as a non-error.
    #[error("key `{0}` not found")]
    KeyNotFound(String),
    /// The file could not be read or written.  In-memory state may be ahead of disk.
    #[error("could not access store `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The store file exists but is not a single JSON object.
    #[error("could not parse store `{}`: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the fast cache service
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Failures while answering or mutating a user's blocked status
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("durable store unreachable: {0}")]
    Unreachable(#[from] sqlx::Error),
    #[error("durable store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("cache service failed: {0}")]
    Cache(#[from] CacheError),
}

/// A business-logic failure which is shown to the user verbatim.
///
/// The message may contain `{prefix}`, which is replaced by the prefix the user invoked the
/// command with.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CommandFailure(pub String);

impl CommandFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn render(&self, prefix: &str) -> String {
        self.0.replace("{prefix}", prefix)
    }
}

/// Shorthand for bailing out of a command with a user-facing message.
pub fn fail<T>(message: impl Into<String>) -> anyhow::Result<T> {
    Err(CommandFailure::new(message).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_renders_prefix() {
        let failure = CommandFailure::new("create one with `{prefix}register`.");
        assert_eq!(failure.render("k?"), "create one with `k?register`.");
    }

    #[test]
    fn failure_survives_anyhow() {
        let err: anyhow::Error = fail::<()>("nope").unwrap_err();
        let failure = err.downcast_ref::<CommandFailure>().unwrap();
        assert_eq!(failure.0, "nope");
    }

    #[test]
    fn key_not_found_is_distinguishable() {
        let err = StoreError::KeyNotFound("123".to_owned());
        assert!(matches!(err, StoreError::KeyNotFound(ref key) if key == "123"));
        assert_eq!(err.to_string(), "key `123` not found");
    }
}
