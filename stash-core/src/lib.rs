// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stash Core
//!
//! The path key contract and the two collaborator traits the cache
//! coordinator is built on: authoritative [`Storage`] and volatile [`Cache`].

pub mod cache;
pub mod error;
pub mod path;
pub mod storage;

pub use bytes::Bytes;
pub use cache::{Cache, CacheLookup};
pub use error::{CacheError, CacheResult, StorageError, StorageResult};
pub use path::StoragePath;
pub use storage::{PathStream, Storage};

/// Opaque stored value. Never interpreted by the coordinator.
pub type Payload = Bytes;
