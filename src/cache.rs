//! ETag cache.
//!
//! A bounded, TTL-based store mapping a normalized request path to the last
//! validator the server sent for it, together with the payload. The transport
//! consults it around every GET when caching is enabled, but it has no
//! dependency on the transport and can be used on its own.

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Default lifetime for entries stored without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Default capacity.
pub const DEFAULT_MAX_ENTRIES: usize = 500;
/// Longest lifetime any entry can get. Larger TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL used when the server gives no `max-age` (default: 300 seconds).
    pub default_ttl: Duration,
    /// Maximum number of entries (default: 500).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// One cached resource snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Cache key.
    pub resource_key: String,
    /// ETag sent by the server.
    pub etag: String,
    /// Body of the response that carried `etag`.
    pub data: Value,
    /// Entry is invalid from this instant on.
    pub expires_at: Instant,
    /// `Last-Modified` header, if any.
    pub last_modified: Option<String>,
}

impl CacheEntry {
    /// Whether the entry has passed its expiry.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Size snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries, expired ones included until they are looked up or cleaned.
    pub size: usize,
    /// Configured capacity.
    pub max_size: usize,
}

#[derive(Debug, Default)]
struct Store {
    entries: HashMap<String, CacheEntry>,
    // First-inserted key at the front. Overwrites keep their slot.
    order: VecDeque<String>,
}

impl Store {
    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    fn retain(&mut self, mut keep: impl FnMut(&CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(&*entry));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        before - self.entries.len()
    }
}

/// Insertion-ordered ETag cache with FIFO eviction.
///
/// All operations are infallible: a miss or an expired entry simply reads as
/// "not cached".
#[derive(Debug)]
pub struct EtagCache {
    config: CacheConfig,
    store: Mutex<Store>,
}

impl Default for EtagCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl EtagCache {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: Mutex::new(Store::default()),
        }
    }

    /// Store or overwrite the entry for `key`.
    ///
    /// Expiry is `now + ttl`, or `now + default_ttl` when `ttl` is `None`,
    /// with the TTL clamped to [`MAX_TTL`]. Inserting a new key into a full
    /// cache first evicts the oldest-inserted entry.
    pub fn set(
        &self,
        key: &str,
        etag: impl Into<String>,
        data: Value,
        ttl: Option<Duration>,
        last_modified: Option<String>,
    ) {
        let ttl = ttl.unwrap_or(self.config.default_ttl).min(MAX_TTL);
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };
        let entry = CacheEntry {
            resource_key: key.to_string(),
            etag: etag.into(),
            data,
            expires_at,
            last_modified,
        };

        let mut store = self.store.lock();
        if !store.entries.contains_key(key) {
            if self.config.max_entries == 0 {
                return;
            }
            if store.entries.len() >= self.config.max_entries {
                if let Some(oldest) = store.order.pop_front() {
                    store.entries.remove(&oldest);
                }
            }
            store.order.push_back(key.to_string());
        }
        store.entries.insert(key.to_string(), entry);
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut store = self.store.lock();
        if store.entries.get(key)?.is_expired() {
            store.remove(key);
            return None;
        }
        store.entries.get(key).cloned()
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.store.lock().remove(key)
    }

    /// Remove every entry whose key matches `pattern`. Returns the count removed.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        self.store
            .lock()
            .retain(|entry| !pattern.is_match(&entry.resource_key))
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut store = self.store.lock();
        store.entries.clear();
        store.order.clear();
    }

    /// Drop all expired entries. Returns the count removed.
    ///
    /// Not called by the transport; schedule it if the cache is long-lived.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        self.store.lock().retain(|entry| entry.expires_at > now)
    }

    /// Current size and capacity.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.store.lock().entries.len(),
            max_size: self.config.max_entries,
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
