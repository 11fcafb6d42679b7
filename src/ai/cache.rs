//! # AI Cache Module
//!
//! Content-addressed store for AI replies, keyed by `model:version:sha256`.
//! Each cached value is the reply object with an embedded
//! `ai_enrichment_ts` (Unix seconds); entries older than the TTL read as
//! absent.
//!
//! [`FileCacheStore`] keeps the whole map in memory and rewrites the file on
//! every insert. Read or write failures are logged and the store carries on
//! in memory.

use crate::config::CACHE_TTL_SECS;
use crate::enrichment_errors::AiError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Timestamp key embedded in every cached value
pub const TIMESTAMP_KEY: &str = "ai_enrichment_ts";

/// Whether a cached value is still inside the TTL at `now_secs`
///
/// Values without a positive timestamp never expire.
pub fn is_fresh(value: &Value, now_secs: i64) -> bool {
    let ts = match value.get(TIMESTAMP_KEY) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    };
    ts <= 0 || now_secs - ts <= CACHE_TTL_SECS
}

/// Key/value store shared by every AI call in a run
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn put(&self, key: &str, value: Value);

    /// Drop every entry, including any persisted copy
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty entry inside the TTL
    fn get_fresh(&self, key: &str, now_secs: i64) -> Option<Value> {
        self.get(key)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .filter(|v| is_fresh(v, now_secs))
    }
}

/// In-process cache without persistence
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Cache persisted as a single JSON object on disk
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileCacheStore {
    /// Load the cache file; an absent or corrupt file yields an empty cache
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::ai::cache::{CacheStore, FileCacheStore};
    ///
    /// let store = FileCacheStore::open("/nonexistent/dir/cache.json");
    /// assert!(store.is_empty());
    /// ```
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "Loaded AI cache");
                entries
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to load AI cache, starting empty: {}", e);
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, Value>, AiError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save(&self, entries: &BTreeMap<String, Value>) -> Result<(), AiError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec(entries)?;
        fs::write(&self.path, bytes)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Saved AI cache");
        Ok(())
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        if let Err(e) = self.save(&entries) {
            warn!(path = %self.path.display(), "Failed to save AI cache: {}", e);
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to delete AI cache file: {}", e),
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_freshness_window() {
        let now = 2_000_000_000;
        assert!(is_fresh(&json!({"ai_enrichment_ts": now - 10}), now));
        assert!(!is_fresh(&json!({"ai_enrichment_ts": now - CACHE_TTL_SECS - 1}), now));
        assert!(is_fresh(&json!({"ai_enrichment_ts": "garbage"}), now));
        assert!(is_fresh(&json!({}), now));
    }

    #[test]
    fn test_memory_store_get_fresh() {
        let store = MemoryCacheStore::new();
        store.put("k", json!({"fill": {}, "ai_enrichment_ts": 100}));
        store.put("empty", json!({}));
        assert!(store.get_fresh("k", 200).is_some());
        assert!(store.get_fresh("k", 100 + CACHE_TTL_SECS + 1).is_none());
        assert!(store.get_fresh("empty", 200).is_none());
        store.clear();
        assert!(store.is_empty());
    }
}
