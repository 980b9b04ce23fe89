//! Small JSON key/value stores mirrored to disk
//!
//! Reads are served from memory.  Every `put`/`delete` rewrites the whole file atomically before
//! returning, and writes are serialized so the file always reflects a prefix of the calls made.
//! A [`Transaction`] holds the writer lock across several reads and writes, so read-modify-write
//! sequences from concurrent callers never interleave.

use crate::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};
use tokio::{
    io::AsyncWriteExt,
    sync::{Mutex, OwnedMutexGuard},
};

/// A JSON object persisted to a single file
pub struct JsonStore {
    path: PathBuf,
    data: RwLock<Map<String, Value>>,
    // Held from "mutate in memory" until the file write completes
    writer: Arc<Mutex<()>>,
}

/// Exclusive access to a store.  Changes are staged and only applied by [`Transaction::commit`];
/// dropping the transaction discards them.
pub struct Transaction<'a> {
    store: &'a JsonStore,
    guard: OwnedMutexGuard<()>,
    // Later entries win.  None removes the key.
    staged: Vec<(String, Option<Value>)>,
}

impl JsonStore {
    /// Load the store at `path`.  A missing file is an empty store; a corrupt file is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice::<Map<String, Value>>(&bytes).map_err(|source| {
                    StoreError::Malformed {
                        path: path.clone(),
                        source,
                    }
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the value under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Value under `key` deserialized as `T`.  Values of another shape read as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait for exclusive access
    pub async fn transaction(&self) -> Transaction<'_> {
        Transaction {
            store: self,
            guard: self.writer.clone().lock_owned().await,
            staged: Vec::new(),
        }
    }

    pub async fn put(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put(key, value);
        tx.commit().await
    }

    pub async fn put_as<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.put_as(key, value)?;
        tx.commit().await
    }

    /// Remove `key`.  Fails with [`StoreError::KeyNotFound`] without touching the file if absent.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut tx = self.transaction().await;
        tx.delete(key)?;
        tx.commit().await
    }

    async fn persist(&self, guard: OwnedMutexGuard<()>) -> Result<(), StoreError> {
        let contents = {
            let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_vec(&*data).map_err(|source| StoreError::Serialize {
                key: "*".to_owned(),
                source,
            })?
        };

        // Once started, a write runs to completion even if our caller goes away.  The guard
        // travels with it so the next writer waits for the rename.
        let path = self.path.clone();
        let write = tokio::spawn(async move {
            let _guard = guard;
            atomic_write(&path, &contents).await
        });

        match write.await {
            Ok(result) => result.map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            }),
            Err(join) => Err(StoreError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(join),
            }),
        }
    }
}

impl Transaction<'_> {
    /// Value under `key` as this transaction would leave it
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.staged.iter().rev().find(|(staged, _)| staged == key) {
            Some((_, value)) => value.clone(),
            None => self.store.get(key),
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.staged.push((key.into(), Some(value)));
    }

    pub fn put_as<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StoreError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.put(key, value);
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.contains(key) {
            return Err(StoreError::KeyNotFound(key.to_owned()));
        }
        self.staged.push((key.to_owned(), None));
        Ok(())
    }

    /// Apply the staged changes in memory, then write the file.  A failed write leaves the
    /// changes in memory.
    pub async fn commit(self) -> Result<(), StoreError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        {
            let mut data = self
                .store
                .data
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for (key, value) in self.staged {
                match value {
                    Some(value) => {
                        data.insert(key, value);
                    }
                    None => {
                        data.remove(&key);
                    }
                }
            }
        }

        self.store.persist(self.guard).await
    }
}

/// Temporary file next to `path` which is renamed over it
pub fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    path.with_file_name(name)
}

/// Replace `path` with `contents` such that readers see either the old or the new file, never a
/// partial one, even across a power loss.
pub async fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Create a temporary file in the same directory and flush it to disk.
    let tmp_path = temporary_path(path);
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    // Atomically rename the temporary file over the target file.
    tokio::fs::rename(&tmp_path, path).await?;

    // Make the rename itself durable.
    #[cfg(unix)]
    {
        let dir = tokio::fs::File::open(parent.unwrap_or(Path::new("."))).await?;
        dir.sync_all().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn file_json(path: &Path) -> Value {
        serde_json::from_slice(&tokio::fs::read(path).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn timezone_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timezones.json");

        let store = JsonStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 0);
        assert!(!path.exists());

        store.put("123", json!("UTC")).await.unwrap();
        assert_eq!(file_json(&path).await, json!({"123": "UTC"}));
        assert_eq!(store.get("123"), Some(json!("UTC")));

        store.delete("123").await.unwrap();
        assert_eq!(file_json(&path).await, json!({}));
        assert_eq!(store.get("123"), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("currency.json");

        let store = JsonStore::open(&path).await.unwrap();
        store
            .put("42", json!({"wallet": 12.5, "grace_period": 0, "last_stole": 0}))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("42"),
            Some(json!({"wallet": 12.5, "grace_period": 0, "last_stole": 0}))
        );
    }

    #[tokio::test]
    async fn deleting_absent_key_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonStore::open(&path).await.unwrap();
        store.put("a", json!(1)).await.unwrap();
        let before = tokio::fs::read(&path).await.unwrap();

        let err = store.delete("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::KeyNotFound(key) if key == "missing"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), before);
    }

    #[tokio::test]
    async fn interrupted_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonStore::open(&path).await.unwrap();
        store.put("a", json!(1)).await.unwrap();
        drop(store);

        // Crash after the temporary file was written but before the rename.
        tokio::fs::write(temporary_path(&path), b"{\"a\": 2, \"b\"")
            .await
            .unwrap();

        let reopened = JsonStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a"), Some(json!(1)));
        assert_eq!(reopened.get("b"), None);
    }

    #[tokio::test]
    async fn concurrent_puts_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonStore::open(&path).await.unwrap());

        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.put("a", json!(1)).await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.put("b", json!(2)).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(file_json(&path).await, json!({"a": 1, "b": 2}));
        let reopened = JsonStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a"), Some(json!(1)));
        assert_eq!(reopened.get("b"), Some(json!(2)));
    }

    #[tokio::test]
    async fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = JsonStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Malformed { .. }));

        // A top-level value other than an object is just as corrupt.
        tokio::fs::write(&path, b"[1, 2, 3]").await.unwrap();
        let err = JsonStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[tokio::test]
    async fn failed_write_keeps_mutation_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a regular file, so the write cannot succeed.
        let blocker = dir.path().join("sub");
        let path = blocker.join("store.json");

        let store = JsonStore::open(&path).await.unwrap();
        tokio::fs::write(&blocker, b"").await.unwrap();

        let err = store.put("a", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.get("a"), Some(json!(1)));
    }

    #[tokio::test]
    async fn get_returns_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).await.unwrap();
        store.put("k", json!({"wallet": 1.0})).await.unwrap();

        let mut copy = store.get("k").unwrap();
        copy["wallet"] = json!(1000.0);

        assert_eq!(store.get("k"), Some(json!({"wallet": 1.0})));
    }

    #[tokio::test]
    async fn typed_access() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Pref {
            twelve_hour: bool,
        }

        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).await.unwrap();
        store
            .put_as("1", &Pref { twelve_hour: true })
            .await
            .unwrap();
        store.put("2", json!("not a pref")).await.unwrap();

        assert_eq!(store.get_as::<Pref>("1"), Some(Pref { twelve_hour: true }));
        assert_eq!(store.get_as::<Pref>("2"), None);
        assert!(store.get("2").is_some());
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        atomic_write(&path, b"{\"a\": 1}").await.unwrap();
        atomic_write(&path, b"{\"a\": 2}").await.unwrap();

        assert_eq!(file_json(&path).await, json!({"a": 2}));
        assert!(!temporary_path(&path).exists());
    }

    #[tokio::test]
    async fn transactions_stage_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonStore::open(&path).await.unwrap();
        store.put("a", json!(1)).await.unwrap();

        let mut tx = store.transaction().await;
        tx.put("b", json!(2));
        tx.delete("a").unwrap();
        assert_eq!(tx.get("b"), Some(json!(2)));
        assert!(!tx.contains("a"));
        assert!(matches!(tx.delete("a"), Err(StoreError::KeyNotFound(_))));
        // Nothing is visible outside until commit
        assert_eq!(store.get("a"), Some(json!(1)));
        assert_eq!(store.get("b"), None);
        tx.commit().await.unwrap();

        assert_eq!(file_json(&path).await, json!({"b": 2}));

        let mut tx = store.transaction().await;
        tx.put("c", json!(3));
        drop(tx);
        assert_eq!(store.get("c"), None);
        assert_eq!(file_json(&path).await, json!({"b": 2}));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonStore::open(&path).await.unwrap());
        store.put("n", json!(0)).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut tx = store.transaction().await;
                    let n = tx.get_as::<u64>("n").unwrap();
                    tokio::task::yield_now().await;
                    tx.put("n", json!(n + 1));
                    tx.commit().await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get("n"), Some(json!(8)));
        assert_eq!(file_json(&path).await, json!({"n": 8}));
    }
}
