// SPDX-License-Identifier: AGPL-3.0-or-later
//! Volatile cache trait

use async_trait::async_trait;

use crate::{error::CacheResult, Payload, StoragePath};

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Payload),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn into_payload(self) -> Option<Payload> {
        match self {
            CacheLookup::Hit(payload) => Some(payload),
            CacheLookup::Miss => None,
        }
    }
}

impl From<Option<Payload>> for CacheLookup {
    fn from(value: Option<Payload>) -> Self {
        match value {
            Some(payload) => CacheLookup::Hit(payload),
            None => CacheLookup::Miss,
        }
    }
}

/// Volatile, possibly-evicting path-keyed store.
///
/// An ordinary miss is `Ok(CacheLookup::Miss)`, never an error. Entries may
/// disappear at any time through the implementation's own eviction.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn lookup(&self, path: &StoragePath) -> CacheResult<CacheLookup>;

    async fn store(&self, path: &StoragePath, payload: Payload) -> CacheResult<()>;

    async fn exists(&self, path: &StoragePath) -> CacheResult<bool>;

    /// Drop the entry at `path`; a no-op when there is none
    async fn evict(&self, path: &StoragePath) -> CacheResult<()>;
}
