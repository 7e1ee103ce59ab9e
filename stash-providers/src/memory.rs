// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory storage backend
//!
//! Objects live in an ordered map. A path counts as a directory when at least
//! one object is stored below `path + "/"`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use stash_core::{
    path::SEPARATOR, PathStream, Payload, Storage, StorageError, StorageResult, StoragePath,
};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    payload: Payload,
    modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(payload: Payload) -> Self {
        Self { payload, modified: Utc::now() }
    }
}

/// Ephemeral storage backend
pub struct MemoryStorage {
    id: String,
    objects: RwLock<BTreeMap<StoragePath, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_id("memory")
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn is_descendant(dir: &StoragePath, key: &StoragePath) -> bool {
    let prefix = dir.descendant_prefix();
    key.as_str().len() > prefix.len() && key.as_str().starts_with(&prefix)
}

fn has_descendants(objects: &BTreeMap<StoragePath, StoredObject>, dir: &StoragePath) -> bool {
    objects.keys().any(|k| is_descendant(dir, k))
}

/// The object at `path` and everything below it, re-keyed under `target`
fn relocated(
    objects: &BTreeMap<StoragePath, StoredObject>,
    path: &StoragePath,
    target: &StoragePath,
) -> Vec<(StoragePath, StoragePath, StoredObject)> {
    let prefix_len = path.descendant_prefix().len();
    objects
        .iter()
        .filter_map(|(key, obj)| {
            if key == path {
                Some((key.clone(), target.clone(), obj.clone()))
            } else if is_descendant(path, key) {
                let rest = &key.as_str()[prefix_len..];
                Some((key.clone(), target.join(rest), obj.clone()))
            } else {
                None
            }
        })
        .collect()
}

fn check_target(path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
    if target.is_root() {
        return Err(StorageError::InvalidPath(format!("cannot replace root with {path}")));
    }
    if is_descendant(path, target) {
        return Err(StorageError::InvalidPath(format!("{target} is inside {path}")));
    }
    Ok(())
}

#[async_trait]
impl Storage for MemoryStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, path: &StoragePath) -> StorageResult<Option<Payload>> {
        Ok(self.objects.read().await.get(path).map(|o| o.payload.clone()))
    }

    async fn set(&self, path: &StoragePath, payload: Payload) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::InvalidPath("cannot store at root".into()));
        }
        self.objects.write().await.insert(path.clone(), StoredObject::new(payload));
        Ok(())
    }

    async fn contains(&self, path: &StoragePath) -> StorageResult<bool> {
        let objects = self.objects.read().await;
        Ok(objects.contains_key(path) || has_descendants(&objects, path))
    }

    async fn move_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        if path == target {
            return if self.contains(path).await? {
                Ok(())
            } else {
                Err(StorageError::NotFound(path.to_string()))
            };
        }
        check_target(path, target)?;

        let mut objects = self.objects.write().await;
        let moves = relocated(&objects, path, target);
        if moves.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        for (from, _, _) in &moves {
            objects.remove(from);
        }
        for (_, to, obj) in moves {
            objects.insert(to, obj);
        }
        Ok(())
    }

    async fn copy_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        if path == target {
            return Err(StorageError::InvalidPath(format!("cannot copy {path} onto itself")));
        }
        check_target(path, target)?;

        let mut objects = self.objects.write().await;
        let copies = relocated(&objects, path, target);
        if copies.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        for (_, to, obj) in copies {
            objects.insert(to, StoredObject::new(obj.payload));
        }
        Ok(())
    }

    async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::InvalidPath("cannot remove root".into()));
        }
        let mut objects = self.objects.write().await;
        objects.remove(path);
        objects.retain(|k, _| !is_descendant(path, k));
        Ok(())
    }

    async fn touch(&self, path: &StoragePath) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        if let Some(obj) = objects.get_mut(path) {
            obj.modified = Utc::now();
            return Ok(());
        }
        if has_descendants(&objects, path) {
            return Ok(());
        }
        Err(StorageError::NotFound(path.to_string()))
    }

    async fn scan(&self, path: &StoragePath) -> StorageResult<PathStream> {
        let objects = self.objects.read().await;
        let prefix = path.descendant_prefix();

        let children: BTreeSet<StoragePath> = objects
            .keys()
            .filter(|k| is_descendant(path, k))
            .filter_map(|k| {
                let name = k.as_str()[prefix.len()..].split(SEPARATOR).next()?;
                (!name.is_empty()).then(|| StoragePath::new(format!("{prefix}{name}")))
            })
            .collect();

        if children.is_empty() && !path.is_root() {
            return Err(if objects.contains_key(path) {
                StorageError::NotADirectory(path.to_string())
            } else {
                StorageError::NotFound(path.to_string())
            });
        }

        let items: Vec<StorageResult<StoragePath>> = children.into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn modified(&self, path: &StoragePath) -> StorageResult<DateTime<Utc>> {
        let objects = self.objects.read().await;
        if let Some(obj) = objects.get(path) {
            return Ok(obj.modified);
        }
        objects
            .iter()
            .filter(|(k, _)| is_descendant(path, k))
            .map(|(_, o)| o.modified)
            .max()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;

    fn p(s: &str) -> StoragePath {
        StoragePath::new(s)
    }

    async fn listing(storage: &MemoryStorage, path: &str) -> Vec<String> {
        let stream = storage.scan(&p(path)).await.unwrap();
        let paths: Vec<StoragePath> = stream.try_collect().await.unwrap();
        paths.into_iter().map(StoragePath::into_string).collect()
    }

    #[tokio::test]
    async fn test_get_set() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get(&p("a/b")).await.unwrap(), None);

        storage.set(&p("a/b"), Bytes::from("x")).await.unwrap();
        assert_eq!(storage.get(&p("a/b")).await.unwrap(), Some(Bytes::from("x")));
        assert_eq!(storage.get(&p("/a/b")).await.unwrap(), None);

        assert!(storage.set(&StoragePath::root(), Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_contains_objects_and_directories() {
        let storage = MemoryStorage::new();
        storage.set(&p("a/b/c"), Bytes::from("x")).await.unwrap();

        assert!(storage.contains(&p("a/b/c")).await.unwrap());
        assert!(storage.contains(&p("a/b")).await.unwrap());
        assert!(storage.contains(&p("a")).await.unwrap());
        assert!(!storage.contains(&p("a/b/c/d")).await.unwrap());
        assert!(!storage.contains(&p("a/bc")).await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_lists_immediate_children_once() {
        let storage = MemoryStorage::new();
        for key in ["docs/a.txt", "docs/b.txt", "docs/sub/c.txt", "docs/sub/d.txt", "other"] {
            storage.set(&p(key), Bytes::from("x")).await.unwrap();
        }

        assert_eq!(listing(&storage, "docs").await, vec!["docs/a.txt", "docs/b.txt", "docs/sub"]);
        assert_eq!(listing(&storage, "").await, vec!["docs", "other"]);
    }

    #[tokio::test]
    async fn test_scan_errors() {
        let storage = MemoryStorage::new();
        storage.set(&p("file"), Bytes::from("x")).await.unwrap();

        assert!(matches!(storage.scan(&p("file")).await, Err(StorageError::NotADirectory(_))));
        assert!(matches!(storage.scan(&p("nope")).await, Err(StorageError::NotFound(_))));
        assert!(listing(&MemoryStorage::new(), "").await.is_empty());
    }

    #[tokio::test]
    async fn test_move_subtree() {
        let storage = MemoryStorage::new();
        storage.set(&p("a"), Bytes::from("root-object")).await.unwrap();
        storage.set(&p("a/x"), Bytes::from("1")).await.unwrap();
        storage.set(&p("a/y/z"), Bytes::from("2")).await.unwrap();
        storage.set(&p("ab"), Bytes::from("sibling")).await.unwrap();

        storage.move_to(&p("a"), &p("c")).await.unwrap();

        assert_eq!(storage.get(&p("c")).await.unwrap(), Some(Bytes::from("root-object")));
        assert_eq!(storage.get(&p("c/x")).await.unwrap(), Some(Bytes::from("1")));
        assert_eq!(storage.get(&p("c/y/z")).await.unwrap(), Some(Bytes::from("2")));
        assert!(!storage.contains(&p("a")).await.unwrap());
        assert_eq!(storage.get(&p("ab")).await.unwrap(), Some(Bytes::from("sibling")));
    }

    #[tokio::test]
    async fn test_move_failures() {
        let storage = MemoryStorage::new();
        let err = storage.move_to(&p("missing"), &p("t")).await.unwrap_err();
        assert!(err.is_not_found());

        storage.set(&p("a/b"), Bytes::from("x")).await.unwrap();
        assert!(matches!(
            storage.move_to(&p("a"), &p("a/b/c")).await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.move_to(&p("a/b"), &StoragePath::root()).await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let storage = MemoryStorage::new();
        storage.set(&p("src/f"), Bytes::from("data")).await.unwrap();

        storage.copy_to(&p("src"), &p("dst")).await.unwrap();

        assert_eq!(storage.get(&p("src/f")).await.unwrap(), Some(Bytes::from("data")));
        assert_eq!(storage.get(&p("dst/f")).await.unwrap(), Some(Bytes::from("data")));
        assert!(storage.copy_to(&p("nothing"), &p("x")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_is_recursive_and_idempotent() {
        let storage = MemoryStorage::new();
        storage.set(&p("d/a"), Bytes::from("1")).await.unwrap();
        storage.set(&p("d/b/c"), Bytes::from("2")).await.unwrap();
        storage.set(&p("dd"), Bytes::from("3")).await.unwrap();

        storage.remove(&p("d")).await.unwrap();
        storage.remove(&p("d")).await.unwrap();

        assert_eq!(storage.len().await, 1);
        assert!(storage.contains(&p("dd")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_root_is_rejected() {
        let storage = MemoryStorage::new();
        storage.set(&p("a"), Bytes::from("1")).await.unwrap();

        assert!(matches!(
            storage.remove(&StoragePath::root()).await,
            Err(StorageError::InvalidPath(_))
        ));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_touch_updates_modified_only() {
        let storage = MemoryStorage::new();
        storage.set(&p("f"), Bytes::from("keep")).await.unwrap();
        let before = storage.modified(&p("f")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.touch(&p("f")).await.unwrap();

        assert!(storage.modified(&p("f")).await.unwrap() > before);
        assert_eq!(storage.get(&p("f")).await.unwrap(), Some(Bytes::from("keep")));
        assert!(storage.touch(&p("missing")).await.unwrap_err().is_not_found());
    }
}
