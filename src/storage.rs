//! Scalar local store: small JSON documents under fixed keys

use crate::error::{HelpError, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Persistence port for behavior and offline status records
pub trait ScalarStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a record. Missing keys, read errors and malformed JSON
/// all come back as `None` so callers fall back to defaults.
pub fn load_json<T: DeserializeOwned>(store: &dyn ScalarStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Could not read '{}': {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            let err = HelpError::SerializationFailure(format!("{}: {}", key, e));
            warn!("{}; using defaults", err);
            None
        }
    }
}

pub fn save_json<T: Serialize>(store: &dyn ScalarStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// One `<key>.json` file per key inside a directory
pub struct FileScalarStore {
    dir: PathBuf,
}

impl FileScalarStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ScalarStore for FileScalarStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-process store. Clones share the same map, which lets tests model
/// two writers on one namespace.
#[derive(Clone, Default)]
pub struct MemoryScalarStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|_| HelpError::StoreUnavailable("scalar store lock poisoned".to_string()))
    }
}

impl ScalarStore for MemoryScalarStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        count: u32,
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileScalarStore::new(dir.path().join("state"));

        assert_eq!(store.get("missing").unwrap(), None);

        save_json(&store, "record", &Record { count: 7 }).unwrap();
        assert!(dir.path().join("state/record.json").exists());
        assert_eq!(load_json::<Record>(&store, "record"), Some(Record { count: 7 }));

        store.remove("record").unwrap();
        assert_eq!(store.get("record").unwrap(), None);
        // removing twice is fine
        store.remove("record").unwrap();
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let store = MemoryScalarStore::new();
        store.set("record", "{not json").unwrap();
        assert_eq!(load_json::<Record>(&store, "record"), None);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let a = MemoryScalarStore::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }
}
