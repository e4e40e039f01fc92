//! TTL + LRU caches for expensive relationship and path queries
//!
//! Three scopes, mirroring the query shapes they serve: single-pair
//! lookups, per-entity relationship lists, and path results. Every entry
//! carries a TTL and the whole scope is LRU-bounded. Any relationship write
//! synchronously invalidates the pair entry, both entities' list entries,
//! and every path entry mentioning either entity in either direction.

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::constants::{
    ENTITY_CACHE_TTL_SECS, PAIR_CACHE_TTL_SECS, PATH_CACHE_TTL_SECS,
    RELATIONSHIP_CACHE_CAPACITY,
};
use crate::graph::{canonical_pair, RelationshipEdge};

struct CachedEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// An LRU cache whose entries also expire after a fixed TTL
pub struct TtlLruCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, CachedEntry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, ttl_secs: i64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Fetch a live entry; expired entries are evicted on access
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock();
        match cache.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: K, value: V) {
        let entry = CachedEntry {
            value,
            expires_at: Utc::now() + self.ttl,
        };
        self.inner.lock().put(key, entry);
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.lock().pop(key);
    }

    /// Remove every entry whose key matches the predicate
    pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) {
        let mut cache = self.inner.lock();
        let stale: Vec<K> = cache
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Cache key for path queries: endpoints plus the hop bound
pub type PathKey = (String, String, usize);

/// The three relationship cache scopes, invalidated together
pub struct RelationshipCaches {
    /// Canonical entity pair → active edges between them
    pub pair: TtlLruCache<(String, String), Vec<RelationshipEdge>>,
    /// Entity → its active edges
    pub entity: TtlLruCache<String, Vec<RelationshipEdge>>,
    /// (from, to, max_hops) → shortest path, None cached for "no path"
    pub path: TtlLruCache<PathKey, Option<Vec<String>>>,
}

impl Default for RelationshipCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipCaches {
    pub fn new() -> Self {
        Self {
            pair: TtlLruCache::new(RELATIONSHIP_CACHE_CAPACITY, PAIR_CACHE_TTL_SECS),
            entity: TtlLruCache::new(RELATIONSHIP_CACHE_CAPACITY, ENTITY_CACHE_TTL_SECS),
            path: TtlLruCache::new(RELATIONSHIP_CACHE_CAPACITY, PATH_CACHE_TTL_SECS),
        }
    }

    /// Invalidate everything a relationship write between `a` and `b` could
    /// have made stale
    ///
    /// Called synchronously from every create/update/soft-delete before the
    /// write returns.
    pub fn invalidate_pair(&self, a: &str, b: &str) {
        let pair = canonical_pair(a.to_string(), b.to_string());
        self.pair.invalidate(&pair);
        self.entity.invalidate(&pair.0);
        self.entity.invalidate(&pair.1);
        self.path.invalidate_where(|(from, to, _)| {
            from == a || to == a || from == b || to == b
        });
        debug!(a, b, "invalidated relationship caches for pair");
    }
}
