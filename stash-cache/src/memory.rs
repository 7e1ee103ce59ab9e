// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory LRU cache

use async_trait::async_trait;
use lru::LruCache;
use stash_core::{Cache, CacheLookup, CacheResult, Payload, StoragePath};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::CacheStats;

/// Default maximum number of entries
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Process-local cache bounded by entry count.
///
/// When full, the least recently looked-up entry is dropped.
pub struct MemoryCache {
    entries: Mutex<LruCache<StoragePath, Payload>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self::from_lru(LruCache::new(capacity))
    }

    /// Create a cache that never evicts on its own
    pub fn unbounded() -> Self {
        Self::from_lru(LruCache::unbounded())
    }

    fn from_lru(entries: LruCache<StoragePath, Payload>) -> Self {
        Self {
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current entry without touching recency or statistics
    pub async fn peek(&self, path: &StoragePath) -> Option<Payload> {
        self.entries.lock().await.peek(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            entries: entries.len() as u64,
            total_size: entries.iter().map(|(_, v)| v.len() as u64).sum(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn lookup(&self, path: &StoragePath) -> CacheResult<CacheLookup> {
        let found = self.entries.lock().await.get(path).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found.into())
    }

    async fn store(&self, path: &StoragePath, payload: Payload) -> CacheResult<()> {
        self.entries.lock().await.put(path.clone(), payload);
        Ok(())
    }

    async fn exists(&self, path: &StoragePath) -> CacheResult<bool> {
        Ok(self.entries.lock().await.contains(path))
    }

    async fn evict(&self, path: &StoragePath) -> CacheResult<()> {
        self.entries.lock().await.pop(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn path(s: &str) -> StoragePath {
        StoragePath::new(s)
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = MemoryCache::default();
        assert_eq!(cache.lookup(&path("a/b")).await.unwrap(), CacheLookup::Miss);

        cache.store(&path("a/b"), Bytes::from("x")).await.unwrap();
        assert_eq!(
            cache.lookup(&path("a/b")).await.unwrap(),
            CacheLookup::Hit(Bytes::from("x"))
        );
        assert!(cache.exists(&path("a/b")).await.unwrap());
        assert!(!cache.exists(&path("a//b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_is_idempotent() {
        let cache = MemoryCache::default();
        cache.store(&path("k"), Bytes::from("v")).await.unwrap();

        cache.evict(&path("k")).await.unwrap();
        cache.evict(&path("k")).await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.store(&path("a"), Bytes::from("1")).await.unwrap();
        cache.store(&path("b"), Bytes::from("2")).await.unwrap();

        // Make "a" most recently used, so "b" goes first
        assert!(cache.lookup(&path("a")).await.unwrap().is_hit());
        cache.store(&path("c"), Bytes::from("3")).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.peek(&path("a")).await.is_some());
        assert!(cache.peek(&path("b")).await.is_none());
        assert!(cache.peek(&path("c")).await.is_some());
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one() {
        let cache = MemoryCache::new(0);
        cache.store(&path("a"), Bytes::from("1")).await.unwrap();
        cache.store(&path("b"), Bytes::from("2")).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = MemoryCache::unbounded();
        cache.store(&path("a"), Bytes::from("abc")).await.unwrap();
        cache.store(&path("b"), Bytes::from("de")).await.unwrap();

        cache.lookup(&path("a")).await.unwrap();
        cache.lookup(&path("missing")).await.unwrap();
        // exists and peek do not count
        cache.exists(&path("a")).await.unwrap();
        cache.peek(&path("b")).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_size, 5);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);

        cache.clear().await;
        assert_eq!(cache.stats().await.entries, 0);
    }
}
