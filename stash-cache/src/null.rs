// SPDX-License-Identifier: AGPL-3.0-or-later
//! Disabled cache

use async_trait::async_trait;
use stash_core::{Cache, CacheLookup, CacheResult, Payload, StoragePath};

/// Cache that holds nothing. Every lookup misses and every write is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn lookup(&self, _path: &StoragePath) -> CacheResult<CacheLookup> {
        Ok(CacheLookup::Miss)
    }

    async fn store(&self, _path: &StoragePath, _payload: Payload) -> CacheResult<()> {
        Ok(())
    }

    async fn exists(&self, _path: &StoragePath) -> CacheResult<bool> {
        Ok(false)
    }

    async fn evict(&self, _path: &StoragePath) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_never_holds_anything() {
        let cache = NullCache;
        let path = StoragePath::new("a");
        cache.store(&path, Bytes::from("x")).await.unwrap();
        assert_eq!(cache.lookup(&path).await.unwrap(), CacheLookup::Miss);
        assert!(!cache.exists(&path).await.unwrap());
        cache.evict(&path).await.unwrap();
    }
}
