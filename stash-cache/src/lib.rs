// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache backends for Stash
//!
//! Supports:
//! - memory: bounded in-process LRU
//! - null: caching disabled
//! - sled: persistent embedded KV (default feature)

mod memory;
mod null;

#[cfg(feature = "sled")]
pub mod sled_backend;

pub use memory::MemoryCache;
pub use null::NullCache;

#[cfg(feature = "sled")]
pub use sled_backend::{SledCache, SledCacheConfig};

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entries: u64,
    pub total_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 { 0.0 } else { self.hit_count as f64 / total as f64 }
    }
}
