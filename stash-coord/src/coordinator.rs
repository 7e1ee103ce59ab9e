// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache coordinator
//!
//! Decides, per operation, whether to consult the cache, write through,
//! invalidate or bypass it. Storage is authoritative: its errors are returned
//! unchanged. The cache is fail-open: every cache error is logged and treated
//! as a miss (reads) or as a skipped write (mutations).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use stash_core::{
    Cache, CacheLookup, PathStream, Payload, Storage, StorageResult, StoragePath,
};

/// Consistency layer between a [`Cache`] and an authoritative [`Storage`].
///
/// Holds nothing but its two collaborators. Concurrent calls for the same
/// path are not serialized; callers needing that must lock above this layer.
pub struct CacheCoordinator {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn Cache>,
}

impl CacheCoordinator {
    pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn Cache>) -> Self {
        Self { storage, cache }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Read `path`, from the cache when it holds the entry.
    ///
    /// On a miss the storage is read and a found payload is written into the
    /// cache before returning. An absent value is never cached.
    pub async fn get(&self, path: &StoragePath) -> StorageResult<Option<Payload>> {
        if let Some(payload) = self.cached(path).await {
            return Ok(Some(payload));
        }

        debug!(path = %path, storage = self.storage.id(), "reading from storage");
        let found = self.storage.get(path).await?;
        if let Some(payload) = &found {
            self.populate(path, payload.clone()).await;
        }
        Ok(found)
    }

    /// Write-through.
    ///
    /// Storage is written first so a cache entry only ever appears for data
    /// that is already durable. A storage failure returns before the cache is
    /// touched.
    pub async fn set(&self, path: &StoragePath, payload: Payload) -> StorageResult<()> {
        self.storage.set(path, payload.clone()).await?;
        debug!(path = %path, size = payload.len(), "write-through");
        self.populate(path, payload).await;
        Ok(())
    }

    /// Presence check. The storage is asked only when the cache has no entry,
    /// and a positive storage answer does not populate the cache.
    pub async fn contains(&self, path: &StoragePath) -> StorageResult<bool> {
        if self.cache_exists(path).await {
            return Ok(true);
        }
        self.storage.contains(path).await
    }

    /// Move `path` to `target`.
    ///
    /// When the source is cached, its payload is carried over to the target
    /// entry once the storage move succeeded. An uncached source causes no
    /// cache side effects at all.
    pub async fn move_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        let cached = self.cached(path).await;

        self.storage.move_to(path, target).await?;

        if let Some(payload) = cached {
            debug!(from = %path, to = %target, "moving cache entry");
            self.invalidate(path).await;
            self.populate(target, payload).await;
        }
        Ok(())
    }

    /// Copy `path` to `target`, seeding the target entry from a cached source.
    pub async fn copy_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        let cached = self.cached(path).await;

        self.storage.copy_to(path, target).await?;

        if let Some(payload) = cached {
            debug!(from = %path, to = %target, "copying cache entry");
            self.populate(target, payload).await;
        }
        Ok(())
    }

    /// Remove `path` from both sides. The storage removal is attempted even
    /// when the eviction fails.
    pub async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        self.invalidate(path).await;
        self.storage.remove(path).await
    }

    /// Touch `path` in storage and drop its cache entry.
    ///
    /// The entry is not repopulated: the next `get` reads fresh from storage.
    pub async fn touch(&self, path: &StoragePath) -> StorageResult<()> {
        self.invalidate(path).await;
        self.storage.touch(path).await
    }

    /// Directory-style listings always come straight from storage.
    pub async fn scan(&self, path: &StoragePath) -> StorageResult<PathStream> {
        self.storage.scan(path).await
    }

    pub async fn modified(&self, path: &StoragePath) -> StorageResult<DateTime<Utc>> {
        self.storage.modified(path).await
    }

    async fn cached(&self, path: &StoragePath) -> Option<Payload> {
        match self.cache.lookup(path).await {
            Ok(CacheLookup::Hit(payload)) => {
                trace!(path = %path, "cache hit");
                Some(payload)
            }
            Ok(CacheLookup::Miss) => {
                trace!(path = %path, "cache miss");
                None
            }
            Err(e) => {
                warn!(path = %path, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn cache_exists(&self, path: &StoragePath) -> bool {
        match self.cache.exists(path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path = %path, error = %e, "cache existence check failed, treating as absent");
                false
            }
        }
    }

    /// Store into the cache. If the store fails, evict so that an older
    /// entry for `path` cannot outlive the write.
    async fn populate(&self, path: &StoragePath, payload: Payload) {
        if let Err(e) = self.cache.store(path, payload).await {
            warn!(path = %path, error = %e, "cache store failed, skipping");
            self.invalidate(path).await;
        }
    }

    async fn invalidate(&self, path: &StoragePath) {
        if let Err(e) = self.cache.evict(path).await {
            warn!(path = %path, error = %e, "cache evict failed, skipping");
        }
    }
}

#[async_trait]
impl Storage for CacheCoordinator {
    fn id(&self) -> &str {
        self.storage.id()
    }

    async fn get(&self, path: &StoragePath) -> StorageResult<Option<Payload>> {
        CacheCoordinator::get(self, path).await
    }

    async fn set(&self, path: &StoragePath, payload: Payload) -> StorageResult<()> {
        CacheCoordinator::set(self, path, payload).await
    }

    async fn contains(&self, path: &StoragePath) -> StorageResult<bool> {
        CacheCoordinator::contains(self, path).await
    }

    async fn move_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        CacheCoordinator::move_to(self, path, target).await
    }

    async fn copy_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        CacheCoordinator::copy_to(self, path, target).await
    }

    async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        CacheCoordinator::remove(self, path).await
    }

    async fn touch(&self, path: &StoragePath) -> StorageResult<()> {
        CacheCoordinator::touch(self, path).await
    }

    async fn scan(&self, path: &StoragePath) -> StorageResult<PathStream> {
        CacheCoordinator::scan(self, path).await
    }

    async fn modified(&self, path: &StoragePath) -> StorageResult<DateTime<Utc>> {
        CacheCoordinator::modified(self, path).await
    }
}
