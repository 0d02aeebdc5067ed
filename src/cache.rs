//! # State Cache
//!
//! A thread-safe, last-value-wins store keyed by logical name. It is written by
//! the state poller and by snoop handlers, and read by the state export
//! functions.
//!
//! Each value is stored as an immutable [`CacheEntry`] behind an `Arc`. A write
//! builds the new entry first and then swaps the pointer under the lock, so a
//! reader either sees the old record or the new one, never a mix.
//!
//! There is no eviction, TTL or delete: a key that was never written is the
//! only "missing" state.
//!
//! ## Usage
//!
//! ```rust
//! use infinity_bus::cache::StateCache;
//!
//! let cache: StateCache<u32> = StateCache::new();
//! assert!(cache.get("blower").is_none());
//! cache.update("blower", 800);
//! assert_eq!(cache.get("blower"), Some(800));
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A value together with the key it is stored under and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub written_at: DateTime<Utc>,
}

/// Generic last-value-wins store.
#[derive(Debug)]
pub struct StateCache<V> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
}

impl<V> Default for StateCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StateCache<V> {
    pub fn new() -> Self {
        StateCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the value for `key`. Visible to every subsequent read on any thread.
    pub fn update(&self, key: &str, value: V) {
        let entry = Arc::new(CacheEntry {
            key: key.to_string(),
            value,
            written_at: Utc::now(),
        });
        // Entries are built before the lock is taken; a poisoned map is still whole.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), entry);
    }

    /// The full entry for `key`, or `None` if it was never written.
    pub fn entry(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Populated keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> StateCache<V> {
    /// The most recent value for `key`, or `None` if it was never written.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entry(key).map(|entry| entry.value.clone())
    }
}
