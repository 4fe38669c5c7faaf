//! Persistent memoization store
//!
//! A [`FileCache`] is an insertion-ordered key/value container plus a backing file.
//! One instance exists per remote query type (destination problem, title search,
//! source problem).
//!
//! # Persistence
//! - Serialized as a JSON array of `{ "key": .., "value": .. }` records, never as a
//!   native JSON object, so integer keys and numeric-looking string keys survive a
//!   round trip unchanged.
//! - `save` writes the whole state to `<file>.tmp` and renames it over the target.
//! - The in-memory state is always a superset of the last successful save; callers
//!   choose the checkpoints.
//! - A missing or corrupt file yields an empty store, never a startup failure.

use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key/value store used by the memoized lookups
///
/// Implemented by [`FileCache`]; tests may provide in-memory doubles.
pub trait MemoStore<K, V> {
    /// Whether `key` has a cached value
    fn has(&self, key: &K) -> bool;

    /// Cached value for `key`
    fn get(&self, key: &K) -> Option<&V>;

    /// Insert or overwrite the value for `key`
    fn set(&mut self, key: K, value: V);

    /// Flush the whole state to durable storage
    fn save(&self) -> Result<()>;
}

/// One serialized cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
}

/// File-backed, insertion-ordered key/value store
#[derive(Debug)]
pub struct FileCache<K, V> {
    path: PathBuf,
    entries: Vec<CacheEntry<K, V>>,
    index: HashMap<K, usize>,
}

impl<K, V> FileCache<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Create an empty store bound to `path` without touching the file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a store bound to `path` and load it
    ///
    /// Load failures are logged and leave the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::new(path);
        match cache.load() {
            Ok(count) => {
                info!(path = %cache.path.display(), entries = count, "Cache loaded");
            }
            Err(crate::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %cache.path.display(), "No cache file yet, starting empty");
            }
            Err(e) => {
                warn!(path = %cache.path.display(), error = %e, "Cache unreadable, starting empty");
            }
        }
        cache
    }

    /// Replace the in-memory state with the file contents
    ///
    /// The current state is kept if the file cannot be read or parsed.
    /// Returns the number of entries loaded.
    pub fn load(&mut self) -> Result<usize> {
        let records = self.read_records()?;
        self.entries.clear();
        self.index.clear();
        Ok(self.insert_records(records))
    }

    /// Overlay the file contents onto the in-memory state without clearing it
    ///
    /// Keys present in both keep their position and take the file's value.
    pub fn load_merge(&mut self) -> Result<usize> {
        let records = self.read_records()?;
        Ok(self.insert_records(records))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    fn read_records(&self) -> Result<Vec<CacheEntry<K, V>>> {
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn insert_records(&mut self, records: Vec<CacheEntry<K, V>>) -> usize {
        let count = records.len();
        for CacheEntry { key, value } in records {
            self.insert(key, value);
        }
        count
    }

    fn insert(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].value = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(CacheEntry { key, value });
            }
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<K, V> MemoStore<K, V> for FileCache<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn has(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].value)
    }

    fn set(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec(&self.entries)?;
        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(path = %self.path.display(), entries = self.entries.len(), "Cache saved");
        Ok(())
    }
}
