//! Best-effort cold-start cache.
//!
//! Nothing here ever fails loudly: write errors are logged and dropped, and
//! an entry that no longer parses reads as absent and is removed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use jobsync_logging::{sync_debug, sync_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::persist::{prepare_dir, replace_file, PersistError};

pub const USER_KEY: &str = "user";
pub const JOBS_KEY: &str = "jobs";

/// Minimal string key/value storage the cache sits on.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), PersistError>;
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;
}

/// In-process store with an optional byte budget over keys plus values.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    capacity_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity_bytes: Some(capacity),
        }
    }

    /// Writes a raw value, bypassing serialization. Useful to plant corrupt data.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, value)| existing.len() + value.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        if let Some(capacity) = self.capacity_bytes {
            let needed = self.used_bytes_excluding(key) + key.len() + value.len();
            if needed > capacity {
                return Err(PersistError::QuotaExceeded { needed, capacity });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory, replaced atomically on write.
///
/// The directory is prepared once, on `open` or the first write, and again
/// only after a write finds it gone.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    dir_ready: bool,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            dir_ready: false,
        }
    }

    /// Like `new`, but prepares the directory up front so problems surface
    /// at startup instead of on the first write.
    pub fn open(dir: PathBuf) -> Result<Self, PersistError> {
        let mut store = Self::new(dir);
        store.prepare()?;
        Ok(store)
    }

    fn prepare(&mut self) -> Result<(), PersistError> {
        if !self.dir_ready {
            prepare_dir(&self.dir)?;
            self.dir_ready = true;
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        self.prepare()?;
        let result = replace_file(&self.dir, &self.path_for(key), &value);
        if result.as_ref().is_err_and(PersistError::is_missing_dir) {
            self.dir_ready = false;
        }
        result
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.json")
}

pub struct SnapshotCache<S: KeyValueStore> {
    store: S,
    namespace: String,
}

impl<S: KeyValueStore> SnapshotCache<S> {
    pub fn new(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn write<T: Serialize>(&mut self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                sync_warn!("snapshot: cannot serialize {}: {}", full_key, err);
                return;
            }
        };
        match self.store.set(&full_key, text) {
            Ok(()) => sync_debug!("snapshot: wrote {}", full_key),
            Err(err) => sync_warn!("snapshot: dropping write of {}: {}", full_key, err),
        }
    }

    pub fn read<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let text = match self.store.get(&full_key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                sync_warn!("snapshot: cannot read {}: {}", full_key, err);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                sync_warn!("snapshot: clearing corrupt entry {}: {}", full_key, err);
                self.clear(key);
                None
            }
        }
    }

    pub fn clear(&mut self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(err) = self.store.remove(&full_key) {
            sync_warn!("snapshot: cannot clear {}: {}", full_key, err);
        }
    }

    /// The key as the underlying store sees it.
    pub fn full_key(&self, key: &str) -> String {
        format!("{}.{}", self.namespace, key)
    }
}
