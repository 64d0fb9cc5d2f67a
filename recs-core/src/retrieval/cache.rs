//! Vector-search result cache.
//!
//! LRU with TTL, keyed by `(table, query_hash, k, filter_hash)`. The
//! optimization cycle rewrites embeddings in place, so it invalidates
//! the affected table's entries wholesale; per-query invalidation is not
//! worth the bookkeeping at this cache's hit profile.
//!
//! Hit rates and eviction counts are observable but not contractual.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::storage::VectorTable;

/// Hit/miss/eviction counters shared by the engine's caches.
#[derive(Debug, Default, Clone)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    /// Fraction of lookups served from cache.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Cache key for one vector search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorCacheKey {
    pub table: VectorTable,
    pub query_hash: u64,
    pub k: usize,
    pub filter_hash: u64,
}

impl VectorCacheKey {
    /// Build a key by hashing the query vector bits and a filter
    /// fingerprint string.
    #[must_use]
    pub fn new(table: VectorTable, query: &[f32], k: usize, filter_fingerprint: &str) -> Self {
        let mut query_hasher = DefaultHasher::new();
        for value in query {
            value.to_bits().hash(&mut query_hasher);
        }
        let mut filter_hasher = DefaultHasher::new();
        filter_fingerprint.hash(&mut filter_hasher);
        Self {
            table,
            query_hash: query_hasher.finish(),
            k,
            filter_hash: filter_hasher.finish(),
        }
    }
}

struct CachedResult {
    results: Vec<(String, f32)>,
    inserted: Instant,
}

struct Inner {
    entries: LruCache<VectorCacheKey, CachedResult>,
    metrics: CacheMetrics,
}

/// LRU + TTL cache over `(id, cosine_distance)` result lists.
pub struct VectorResultCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl VectorResultCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
            ttl,
        }
    }

    /// Look up a result list; expired entries count as misses.
    pub fn get(&self, key: &VectorCacheKey) -> Option<Vec<(String, f32)>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                let results = entry.results.clone();
                inner.metrics.hits += 1;
                Some(results)
            }
            Some(_) => {
                inner.entries.pop(key);
                inner.metrics.evictions += 1;
                inner.metrics.misses += 1;
                None
            }
            None => {
                inner.metrics.misses += 1;
                None
            }
        }
    }

    /// Insert a result list.
    pub fn put(&self, key: VectorCacheKey, results: Vec<(String, f32)>) {
        let mut inner = self.inner.lock();
        if inner.entries.len() == usize::from(inner.entries.cap()) {
            inner.metrics.evictions += 1;
        }
        inner.entries.put(
            key,
            CachedResult {
                results,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop every entry for one table. Called after embedding rewrites.
    pub fn invalidate_table(&self, table: VectorTable) {
        let mut inner = self.inner.lock();
        let stale: Vec<VectorCacheKey> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.table == table)
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            inner.entries.pop(&key);
            inner.metrics.evictions += 1;
        }
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.lock().metrics.clone()
    }
}
