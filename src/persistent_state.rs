use crate::{log_internal, storage::JsonStore};
use anyhow::{anyhow, Result};
use std::path::Path;

/// State which persists across sessions, one store file per feature
pub struct PersistentState {
    /// User id → IANA timezone name or UTC offset
    pub timezones: JsonStore,
    /// User id → whether to show times on a 12-hour clock
    pub hour_format: JsonStore,
    /// User id → currency account
    pub currency: JsonStore,
}

impl PersistentState {
    pub async fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            timezones: open(dir, "timezones.json").await?,
            hour_format: open(dir, "hour_format.json").await?,
            currency: open(dir, "currency.json").await?,
        })
    }
}

async fn open(dir: &Path, name: &str) -> Result<JsonStore> {
    let store = JsonStore::open(dir.join(name))
        .await
        .map_err(|e| anyhow!("Could not load state: {}", e))?;

    log_internal!(
        "Loaded {} entries from `{}`",
        store.len(),
        store.path().to_string_lossy()
    );

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let pstate = PersistentState::load(dir.path()).await.unwrap();

        pstate.timezones.put("1", json!("UTC")).await.unwrap();
        pstate.hour_format.put("1", json!(true)).await.unwrap();

        assert!(dir.path().join("timezones.json").exists());
        assert!(dir.path().join("hour_format.json").exists());
        assert!(!dir.path().join("currency.json").exists());
    }

    #[tokio::test]
    async fn corrupt_store_stops_loading() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("currency.json"), b"{\"1\": ")
            .await
            .unwrap();

        assert!(PersistentState::load(dir.path()).await.is_err());
    }
}
