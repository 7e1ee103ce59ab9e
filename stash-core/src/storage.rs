// SPDX-License-Identifier: AGPL-3.0-or-later
//! Authoritative storage trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;

use crate::{error::StorageResult, Payload, StoragePath};

/// Lazy, finite stream of child paths from one directory-style listing
pub type PathStream = Pin<Box<dyn Stream<Item = StorageResult<StoragePath>> + Send>>;

/// Durable, path-keyed store. Every error it returns is authoritative.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Identifier used in logs and error messages
    fn id(&self) -> &str;

    /// Read the payload at `path`, `None` when nothing is stored there
    async fn get(&self, path: &StoragePath) -> StorageResult<Option<Payload>>;

    /// Store `payload` at `path`, replacing any previous value
    async fn set(&self, path: &StoragePath, payload: Payload) -> StorageResult<()>;

    async fn contains(&self, path: &StoragePath) -> StorageResult<bool>;

    /// Move `path` to `target`. Fails if the source is absent or the target invalid.
    async fn move_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()>;

    /// Copy `path` to `target`. Same failure modes as [`Storage::move_to`].
    async fn copy_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()>;

    async fn remove(&self, path: &StoragePath) -> StorageResult<()>;

    /// Update metadata (modification time) without changing the payload
    async fn touch(&self, path: &StoragePath) -> StorageResult<()>;

    /// Non-recursive listing of the immediate children of `path`
    async fn scan(&self, path: &StoragePath) -> StorageResult<PathStream>;

    /// Last modification time of `path`
    async fn modified(&self, path: &StoragePath) -> StorageResult<DateTime<Utc>>;
}
