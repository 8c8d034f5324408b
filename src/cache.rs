//! In-memory TTL caching.
//!
//! A small lock-protected store used for classification results (and any
//! future result caching). Expired entries are evicted lazily on the next
//! read; there is no background sweeper.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A single cached value with an optional absolute expiry deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// Absolute deadline after which the entry is stale. `None` never expires.
    pub expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    /// Returns true once the entry's deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Simple in-memory TTL cache with an optional default expiration.
///
/// Keys are explicit strings built from semantically meaningful fields by the
/// caller (e.g. the lowercased question text), never from hashed argument
/// bags, so they stay stable and auditable.
#[derive(Debug, Default)]
pub struct InMemoryTtlCache<T> {
    default_ttl: Option<Duration>,
    store: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> InMemoryTtlCache<T> {
    /// Creates a cache whose entries never expire unless a TTL is passed to `set`.
    pub fn new() -> Self {
        Self {
            default_ttl: None,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a cache with a default TTL applied when `set` passes none.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            default_ttl: Some(default_ttl),
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a value, evicting it first if its deadline has passed.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut store = self.store.lock();
        match store.get(key) {
            None => None,
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
        }
    }

    /// Stores a value under `key`, using `ttl` or the cache default.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        self.store
            .lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Removes a single entry.
    pub fn delete(&self, key: &str) {
        self.store.lock().remove(key);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// Number of stored entries, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}
