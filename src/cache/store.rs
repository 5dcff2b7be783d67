//! TTL- and size-bounded response store.

use crate::context::OperationResult;
use crate::DEFAULT_CACHE_TTL_SECS;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without an explicit one
    pub default_ttl: Duration,
    /// Maximum number of entries before FIFO eviction kicks in
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_size: 1000,
        }
    }
}

struct CacheEntry {
    value: OperationResult,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    // Keys in insertion order, oldest first. Re-inserting a key moves it to
    // the back.
    order: VecDeque<String>,
}

/// Short-circuits idempotent operations with previously seen results.
///
/// Expiry is lazy: an expired entry is removed the first time `get` touches
/// it, and [`cleanup_expired`](ResponseCache::cleanup_expired) exists purely
/// as a maintenance sweep. When the store grows past `max_size`, the
/// oldest-inserted entries are evicted first (FIFO, not LRU).
///
/// # Security
///
/// Key derivation ignores credential-bearing headers (see
/// [`SENSITIVE_HEADERS`](super::SENSITIVE_HEADERS)), so one cache instance
/// must never be shared across distinct security principals.
pub struct ResponseCache {
    config: CacheConfig,
    store: Mutex<CacheStore>,
}

impl ResponseCache {
    /// Creates a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Mutex::new(CacheStore {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            config,
        }
    }

    /// Returns the configuration in effect.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up a key. A miss — absent or expired — is `None`, never an
    /// error. Expired entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<OperationResult> {
        let mut store = self.store.lock();
        match store.entries.get(key) {
            None => None,
            Some(entry) if entry.is_expired() => {
                store.entries.remove(key);
                store.order.retain(|k| k != key);
                debug!(key, "Evicted expired cache entry");
                None
            }
            Some(entry) => Some(entry.value.clone()),
        }
    }

    /// Inserts or overwrites a value with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: OperationResult) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// Inserts or overwrites a value with an explicit TTL.
    ///
    /// If the store then exceeds `max_size`, oldest-inserted entries are
    /// evicted until it is back at capacity.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: OperationResult, ttl: Duration) {
        let key = key.into();
        let mut store = self.store.lock();

        let replaced = store
            .entries
            .insert(
                key.clone(),
                CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                    ttl,
                },
            )
            .is_some();
        if replaced {
            store.order.retain(|k| k != &key);
        }
        store.order.push_back(key);

        while store.entries.len() > self.config.max_size {
            if let Some(oldest) = store.order.pop_front() {
                store.entries.remove(&oldest);
                debug!(key = %oldest, "Evicted oldest cache entry");
            } else {
                break;
            }
        }
    }

    /// Removes a single entry. Returns true if it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut store = self.store.lock();
        let removed = store.entries.remove(key).is_some();
        if removed {
            store.order.retain(|k| k != key);
        }
        removed
    }

    /// Removes every entry whose key matches the predicate. Returns the
    /// number of entries removed.
    pub fn invalidate_matching(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut store = self.store.lock();
        let CacheStore { entries, order } = &mut *store;
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        order.retain(|key| entries.contains_key(key));
        before - entries.len()
    }

    /// Sweeps out every expired entry. Returns the number removed.
    ///
    /// Not required for correctness of `get`; this is a maintenance
    /// operation for long-lived caches with rarely re-read keys.
    pub fn cleanup_expired(&self) -> usize {
        let mut store = self.store.lock();
        let CacheStore { entries, order } = &mut *store;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        order.retain(|key| entries.contains_key(key));
        before - entries.len()
    }

    /// Removes everything.
    pub fn clear(&self) {
        let mut store = self.store.lock();
        store.entries.clear();
        store.order.clear();
    }

    /// Returns the number of stored entries, including not-yet-swept
    /// expired ones.
    pub fn size(&self) -> usize {
        self.store.lock().entries.len()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn result(tag: &'static str) -> OperationResult {
        OperationResult::ok(
            Some(200),
            Duration::from_millis(1),
            Bytes::from_static(tag.as_bytes()),
        )
    }

    fn cache(max_size: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            default_ttl: Duration::from_secs(60),
            max_size,
        })
    }

    #[test]
    fn test_get_miss_on_absent_key() {
        let cache = cache(10);
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let cache = cache(10);
        cache.set("a", result("payload-a"));

        let hit = cache.get("a").unwrap();
        assert_eq!(hit.payload, Bytes::from_static(b"payload-a"));
        assert_eq!(cache.size(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_is_lazy_and_removes_entry() {
        let cache = cache(10);
        cache.set_with_ttl("a", result("x"), Duration::from_millis(20));

        assert!(cache.get("a").is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("a").is_none());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_fifo_eviction_removes_oldest_inserted() {
        let cache = cache(3);
        cache.set("first", result("1"));
        cache.set("second", result("2"));
        cache.set("third", result("3"));

        // Re-read an old key; FIFO ignores recency of access.
        assert!(cache.get("first").is_some());

        cache.set("fourth", result("4"));

        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
        assert!(cache.get("fourth").is_some());
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_overwrite_refreshes_insertion_order() {
        let cache = cache(2);
        cache.set("a", result("1"));
        cache.set("b", result("2"));
        cache.set("a", result("3"));
        cache.set("c", result("4"));

        // "b" is now the oldest insertion and gets evicted.
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().payload, Bytes::from_static(b"3"));
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_invalidate_single_key() {
        let cache = cache(10);
        cache.set("a", result("1"));

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_invalidate_matching_predicate() {
        let cache = cache(10);
        cache.set("users/1", result("1"));
        cache.set("users/2", result("2"));
        cache.set("items/1", result("3"));

        let removed = cache.invalidate_matching(|key| key.starts_with("users/"));

        assert_eq!(removed, 2);
        assert_eq!(cache.size(), 1);
        assert!(cache.get("items/1").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_expired_counts_removals() {
        let cache = cache(10);
        cache.set_with_ttl("short", result("1"), Duration::from_millis(10));
        cache.set_with_ttl("long", result("2"), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.size(), 1);
        assert!(cache.get("long").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = cache(10);
        cache.set("a", result("1"));
        cache.set("b", result("2"));

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.get("a").is_none());
    }
}
