// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local filesystem backend

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use stash_core::{PathStream, Payload, Storage, StorageError, StorageResult, StoragePath};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// Suffix of in-flight atomic writes. Such files never appear in listings.
const TEMP_SUFFIX: &str = ".stash-tmp";

/// Stores every path as a file below a root directory
pub struct LocalStorage {
    id: String,
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(id: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a path onto the filesystem.
    ///
    /// Only canonical paths are accepted: no leading, trailing or doubled
    /// separator and no `.` or `..` segment. Otherwise two unequal paths
    /// would name the same file.
    fn to_real_path(&self, path: &StoragePath) -> StorageResult<PathBuf> {
        let mut real = self.root.clone();
        if path.as_str().is_empty() {
            return Ok(real);
        }
        for seg in path.as_str().split('/') {
            if seg.is_empty() || seg == "." || seg == ".." {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
            real.push(seg);
        }
        Ok(real)
    }

    async fn metadata(&self, real: &Path) -> StorageResult<Option<std::fs::Metadata>> {
        match fs::metadata(real).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn existing(&self, path: &StoragePath) -> StorageResult<(PathBuf, std::fs::Metadata)> {
        let real = self.to_real_path(path)?;
        match self.metadata(&real).await? {
            Some(meta) => Ok((real, meta)),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn writable_target(&self, target: &StoragePath) -> StorageResult<PathBuf> {
        if target.is_root() {
            return Err(StorageError::InvalidPath(format!("cannot replace root: {target}")));
        }
        self.to_real_path(target)
    }
}

async fn create_parent(real: &Path) -> StorageResult<()> {
    if let Some(parent) = real.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn copy_dir<'a>(src: &'a Path, dst: &'a Path) -> BoxFuture<'a, std::io::Result<()>> {
    Box::pin(async move {
        fs::create_dir_all(dst).await?;
        let mut entries = fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let from = entry.path();
            let to = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                copy_dir(&from, &to).await?;
            } else {
                fs::copy(&from, &to).await?;
            }
        }
        Ok(())
    })
}

#[async_trait]
impl Storage for LocalStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, path: &StoragePath) -> StorageResult<Option<Payload>> {
        let real = self.to_real_path(path)?;
        match fs::read(&real).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // Directories hold no payload
            Err(_) if real.is_dir() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, path: &StoragePath, payload: Payload) -> StorageResult<()> {
        let real = self.writable_target(path)?;
        if real.is_dir() {
            return Err(StorageError::NotAFile(path.to_string()));
        }
        create_parent(&real).await?;

        // Write atomically using temp file
        let mut temp_name = real.file_name().unwrap_or_default().to_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = real.with_file_name(temp_name);

        fs::write(&temp_path, &payload).await?;
        if let Err(e) = fs::rename(&temp_path, &real).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        debug!(path = %path, size = payload.len(), "wrote file");
        Ok(())
    }

    async fn contains(&self, path: &StoragePath) -> StorageResult<bool> {
        let real = self.to_real_path(path)?;
        Ok(self.metadata(&real).await?.is_some())
    }

    async fn move_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        let (src, _) = self.existing(path).await?;
        let dst = self.writable_target(target)?;
        if dst.starts_with(&src) && dst != src {
            return Err(StorageError::InvalidPath(format!("{target} is inside {path}")));
        }

        create_parent(&dst).await?;
        fs::rename(&src, &dst).await?;
        debug!(from = %path, to = %target, "moved");
        Ok(())
    }

    async fn copy_to(&self, path: &StoragePath, target: &StoragePath) -> StorageResult<()> {
        let (src, meta) = self.existing(path).await?;
        let dst = self.writable_target(target)?;
        if dst.starts_with(&src) {
            return Err(StorageError::InvalidPath(format!("{target} is inside {path}")));
        }

        create_parent(&dst).await?;
        if meta.is_dir() {
            copy_dir(&src, &dst).await?;
        } else {
            fs::copy(&src, &dst).await?;
        }
        debug!(from = %path, to = %target, "copied");
        Ok(())
    }

    async fn remove(&self, path: &StoragePath) -> StorageResult<()> {
        if path.is_root() {
            return Err(StorageError::InvalidPath("cannot remove root".into()));
        }
        let real = self.to_real_path(path)?;
        match self.metadata(&real).await? {
            None => Ok(()),
            Some(meta) if meta.is_dir() => {
                fs::remove_dir_all(&real).await?;
                Ok(())
            }
            Some(_) => {
                fs::remove_file(&real).await?;
                Ok(())
            }
        }
    }

    async fn touch(&self, path: &StoragePath) -> StorageResult<()> {
        let (real, _) = self.existing(path).await?;
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&real)?;
            file.set_modified(SystemTime::now())
        })
        .await
        .map_err(|e| StorageError::Other(e.to_string()))??;
        Ok(())
    }

    async fn scan(&self, path: &StoragePath) -> StorageResult<PathStream> {
        let (real, meta) = self.existing(path).await?;
        if !meta.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }

        let read_dir = fs::read_dir(&real).await?;
        let parent = path.clone();

        // Yields entries as the directory is read; stops after the first error
        let stream = futures::stream::unfold(Some(read_dir), move |state| {
            let parent = parent.clone();
            async move {
                let mut read_dir = state?;
                loop {
                    match read_dir.next_entry().await {
                        Ok(Some(entry)) => {
                            let name = entry.file_name().to_string_lossy().into_owned();
                            if name.ends_with(TEMP_SUFFIX) {
                                continue;
                            }
                            return Some((Ok(parent.join(name)), Some(read_dir)));
                        }
                        Ok(None) => return None,
                        Err(e) => return Some((Err(StorageError::from(e)), None)),
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }

    async fn modified(&self, path: &StoragePath) -> StorageResult<DateTime<Utc>> {
        let (_, meta) = self.existing(path).await?;
        Ok(meta.modified()?.into())
    }
}
