//! Per-guild settings kept in the shared cache: command prefixes and configuration keys

use crate::{
    cache::KeyValueCache,
    error::{CacheError, CommandFailure},
};
use serenity::all::GuildId;
use std::sync::Arc;

/// Keys a guild may configure, with their type and description
pub const SCHEMA: &[Field] = &[Field {
    key: "message_logging",
    kind: FieldKind::Boolean,
    description: "makes me log all messages i can see in this server.",
}];

pub struct Field {
    pub key: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldKind {
    /// `on`, `off`, `true` or `false`
    Boolean,
}

impl FieldKind {
    pub fn pretty(&self) -> &'static str {
        match self {
            FieldKind::Boolean => "true or false",
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            FieldKind::Boolean => matches!(value, "on" | "off" | "true" | "false"),
        }
    }
}

pub fn field(key: &str) -> Option<&'static Field> {
    SCHEMA.iter().find(|field| field.key == key)
}

/// Guild prefixes and configuration
pub struct GuildSettings {
    cache: Arc<dyn KeyValueCache>,
    namespace: String,
}

impl GuildSettings {
    pub fn new(cache: Arc<dyn KeyValueCache>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
        }
    }

    fn prefixes_key(&self, guild_id: GuildId) -> String {
        format!("{}:prefixes:{}", self.namespace, guild_id)
    }

    fn config_key(&self, guild_id: GuildId, key: &str) -> String {
        format!("{}:guild_config:{}:{}", self.namespace, guild_id, key)
    }

    /// The guild's prefixes, seeded with `defaults` the first time they are asked for
    pub async fn prefixes(
        &self,
        guild_id: GuildId,
        defaults: &[String],
    ) -> Result<Vec<String>, CacheError> {
        let key = self.prefixes_key(guild_id);

        let prefixes = self.cache.members(&key).await?;
        if !prefixes.is_empty() {
            return Ok(prefixes);
        }

        self.cache.add_members(&key, defaults).await?;
        Ok(defaults.to_vec())
    }

    pub async fn add_prefix(
        &self,
        guild_id: GuildId,
        prefix: &str,
        defaults: &[String],
    ) -> anyhow::Result<()> {
        // Make sure the defaults are materialized first, else they would vanish
        self.prefixes(guild_id, defaults).await?;
        self.cache
            .add_members(&self.prefixes_key(guild_id), &[prefix.to_owned()])
            .await?;
        Ok(())
    }

    pub async fn remove_prefix(
        &self,
        guild_id: GuildId,
        prefix: &str,
        defaults: &[String],
    ) -> anyhow::Result<()> {
        let prefixes = self.prefixes(guild_id, defaults).await?;
        if prefixes.len() == 1 {
            return Err(CommandFailure::new("you can't remove the only prefix, lol.").into());
        }
        if !prefixes.iter().any(|p| p == prefix) {
            return Err(CommandFailure::new("that isn't one of my prefixes here.").into());
        }

        self.cache
            .remove_member(&self.prefixes_key(guild_id), prefix)
            .await?;
        Ok(())
    }

    pub async fn set(&self, guild_id: GuildId, key: &str, value: &str) -> Result<(), CacheError> {
        self.cache
            .set(&self.config_key(guild_id, key), value, None)
            .await
    }

    pub async fn get(&self, guild_id: GuildId, key: &str) -> Result<Option<String>, CacheError> {
        self.cache.get(&self.config_key(guild_id, key)).await
    }

    /// Absent, `off` and `false` all read as unset
    pub async fn is_set(&self, guild_id: GuildId, key: &str) -> Result<bool, CacheError> {
        Ok(match self.get(guild_id, key).await? {
            Some(value) => !matches!(value.as_str(), "off" | "false"),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    const GUILD: GuildId = GuildId::new(99);

    fn settings() -> GuildSettings {
        GuildSettings::new(Arc::new(MemoryCache::new()), "kmn:core")
    }

    fn defaults() -> Vec<String> {
        vec!["k?".to_owned()]
    }

    #[tokio::test]
    async fn prefixes_are_seeded() {
        let settings = settings();
        assert_eq!(settings.prefixes(GUILD, &defaults()).await.unwrap(), vec!["k?"]);

        // Changing the defaults later does not touch a seeded guild
        let other = vec!["!".to_owned()];
        assert_eq!(settings.prefixes(GUILD, &other).await.unwrap(), vec!["k?"]);
    }

    #[tokio::test]
    async fn add_and_remove_prefixes() {
        let settings = settings();

        settings.add_prefix(GUILD, "!", &defaults()).await.unwrap();
        let mut prefixes = settings.prefixes(GUILD, &defaults()).await.unwrap();
        prefixes.sort();
        assert_eq!(prefixes, vec!["!", "k?"]);

        settings.remove_prefix(GUILD, "k?", &defaults()).await.unwrap();
        assert_eq!(settings.prefixes(GUILD, &defaults()).await.unwrap(), vec!["!"]);

        let err = settings
            .remove_prefix(GUILD, "!", &defaults())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<CommandFailure>().is_some());
    }

    #[tokio::test]
    async fn config_flags() {
        let settings = settings();
        assert!(!settings.is_set(GUILD, "message_logging").await.unwrap());

        settings.set(GUILD, "message_logging", "on").await.unwrap();
        assert!(settings.is_set(GUILD, "message_logging").await.unwrap());

        settings.set(GUILD, "message_logging", "off").await.unwrap();
        assert!(!settings.is_set(GUILD, "message_logging").await.unwrap());
        assert_eq!(
            settings.get(GUILD, "message_logging").await.unwrap().as_deref(),
            Some("off")
        );
    }

    #[test]
    fn schema_validation() {
        let logging = field("message_logging").unwrap();
        assert!(logging.kind.accepts("on"));
        assert!(!logging.kind.accepts("yes"));
        assert!(field("nope").is_none());
    }
}
