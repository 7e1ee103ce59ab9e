// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Stash
//!
//! Storage errors are authoritative and always reach the caller. Cache errors
//! never do: the coordinator absorbs them.

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Failure reported by the authoritative storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error ({backend}): {message}")]
    Backend { backend: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Failure reported by the volatile cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupted cache entry: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StorageError::NotFound("a/b".into()).is_not_found());

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(StorageError::from(io_err).is_not_found());

        assert!(!StorageError::NotADirectory("a".into()).is_not_found());
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(!StorageError::from(io_err).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::NotFound("foo/bar".into());
        assert_eq!(format!("{}", err), "Path not found: foo/bar");

        let err = StorageError::Backend { backend: "local".into(), message: "disk full".into() };
        assert_eq!(format!("{}", err), "Storage backend error (local): disk full");

        let err = CacheError::Corrupted("a/b".into());
        assert!(format!("{}", err).contains("a/b"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Io(ref m) if m == "boom"));
    }
}
