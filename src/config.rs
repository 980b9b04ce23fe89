use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, UserId};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/kmn/config.toml";
const CONFIG_PATH_ENV: &str = "KMN_CONFIG";

/// Bot configuration
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    pub postgres: Postgres,
    #[serde(default)]
    pub redis: Redis,
    #[serde(default)]
    pub blocked: Blocked,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub streams: Streams,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    #[serde(default)]
    pub admins: Vec<u64>,
    #[serde(default = "default_prefixes")]
    pub default_prefixes: Vec<String>,
    #[serde(default)]
    pub environment: Environment,
    /// Plugin names to skip entirely
    #[serde(default)]
    pub disabled_plugins: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Testing,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Redis {
    /// Without a URL, an in-process cache stands in for Redis
    pub url: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Blocked {
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_timeout_seconds")]
    pub lookup_timeout_seconds: u64,
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Storage {
    /// Where the JSON stores live.  Defaults to the configuration's directory.
    pub directory: Option<PathBuf>,
}

/// Channels the bot reports to
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Streams {
    pub errors: Option<u64>,
    pub guilds: Option<u64>,
}

fn default_prefixes() -> Vec<String> {
    vec!["k?".to_owned()]
}

fn default_max_connections() -> u32 {
    5
}

fn default_timeout_seconds() -> u64 {
    5
}

fn default_namespace() -> String {
    "kmn:core".to_owned()
}

fn default_cache_ttl_seconds() -> u64 {
    600
}

impl Default for Redis {
    fn default() -> Self {
        Self {
            url: None,
            namespace: default_namespace(),
        }
    }
}

impl Default for Blocked {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl_seconds(),
            lookup_timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::from_toml(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }

    /// Add a bot admin and write the configuration.  Nothing changes if the write fails.
    pub async fn add_admin(&mut self, user_id: UserId) -> Result<()> {
        self.add_admin_at(&Self::config_path()?, user_id).await
    }

    async fn add_admin_at(&mut self, path: &Path, user_id: UserId) -> Result<()> {
        self.general.admins.push(user_id.get());
        if let Err(e) = self.save_to(path).await {
            self.general.admins.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(&self)
            .map_err(|e| anyhow!("Could not serialize configuration: {}", e))?;

        crate::storage::atomic_write(path, contents.as_bytes())
            .await
            .map_err(|e| {
                anyhow!(
                    "Could not write configuration to `{}`: {}",
                    path.to_string_lossy(),
                    e
                )
            })
    }

    /// Directory holding the JSON stores
    pub fn storage_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.directory {
            return Ok(dir.clone());
        }

        Self::config_path()?
            .parent()
            .map(Path::to_path_buf)
            .ok_or(anyhow!("Configuration path has no parent directory"))
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.general.admins.contains(&user_id.get())
    }

    pub fn testing(&self) -> bool {
        self.general.environment == Environment::Testing
    }
}

impl Postgres {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

impl Blocked {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }
}

impl Redis {
    /// Namespace for memoized values, as opposed to configuration
    pub fn cache_namespace(&self) -> String {
        format!("{}:cache", self.namespace)
    }
}

impl Streams {
    pub fn errors(&self) -> Option<ChannelId> {
        self.errors.filter(|id| *id != 0).map(ChannelId::new)
    }

    pub fn guilds(&self) -> Option<ChannelId> {
        self.guilds.filter(|id| *id != 0).map(ChannelId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [general]
        discord_token = "token"

        [postgres]
        url = "postgres://kmn@localhost/kmn"
    "#;

    #[test]
    fn defaults() {
        let cfg = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(cfg.general.default_prefixes, vec!["k?"]);
        assert!(cfg.general.admins.is_empty());
        assert_eq!(cfg.general.environment, Environment::Production);
        assert!(!cfg.testing());
        assert_eq!(cfg.postgres.max_connections, 5);
        assert_eq!(cfg.postgres.acquire_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.redis.url, None);
        assert_eq!(cfg.redis.cache_namespace(), "kmn:core:cache");
        assert_eq!(cfg.blocked.cache_ttl(), Duration::from_secs(600));
        assert_eq!(cfg.blocked.lookup_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.streams.errors(), None);
    }

    #[test]
    fn full() {
        let cfg = Config::from_toml(
            r#"
            [general]
            discord_token = "token"
            admins = [138428648901312512]
            default_prefixes = ["!", "k?"]
            environment = "testing"
            disabled_plugins = ["fun"]

            [postgres]
            url = "postgres://kmn@localhost/kmn"
            max_connections = 10

            [redis]
            url = "redis://127.0.0.1/"
            namespace = "kmn:dev"

            [blocked]
            cache_ttl_seconds = 60

            [storage]
            directory = "/var/lib/kmn"

            [streams]
            errors = 1234
            "#,
        )
        .unwrap();

        assert!(cfg.is_admin(UserId::new(138428648901312512)));
        assert!(!cfg.is_admin(UserId::new(1)));
        assert!(cfg.testing());
        assert_eq!(cfg.general.disabled_plugins, vec!["fun"]);
        assert_eq!(cfg.redis.cache_namespace(), "kmn:dev:cache");
        assert_eq!(cfg.blocked.cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.blocked.lookup_timeout(), Duration::from_secs(5));
        assert_eq!(
            cfg.storage_directory().unwrap(),
            PathBuf::from("/var/lib/kmn")
        );
        assert_eq!(cfg.streams.errors(), Some(ChannelId::new(1234)));
        assert_eq!(cfg.streams.guilds(), None);
    }

    #[test]
    fn token_is_required() {
        assert!(Config::from_toml("[general]\n[postgres]\nurl = \"x\"").is_err());
    }

    #[test]
    fn survives_serialization() {
        let cfg = Config::from_toml(MINIMAL).unwrap();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let again = Config::from_toml(&text).unwrap();
        assert_eq!(again.general.discord_token, "token");
        assert_eq!(again.general.default_prefixes, vec!["k?"]);
    }

    #[tokio::test]
    async fn admins_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::from_toml(MINIMAL).unwrap();

        cfg.add_admin_at(&path, UserId::new(5)).await.unwrap();
        assert!(cfg.is_admin(UserId::new(5)));

        let saved = Config::from_toml(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert!(saved.is_admin(UserId::new(5)));
    }

    #[tokio::test]
    async fn failed_save_does_not_promote() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a regular file, so the write cannot succeed.
        let blocker = dir.path().join("kmn");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let mut cfg = Config::from_toml(MINIMAL).unwrap();

        assert!(cfg
            .add_admin_at(&blocker.join("config.toml"), UserId::new(5))
            .await
            .is_err());
        assert!(!cfg.is_admin(UserId::new(5)));
        assert!(cfg.general.admins.is_empty());
    }
}
