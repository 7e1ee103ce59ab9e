// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sled database backend for cache storage
//!
//! Entries are keyed by the exact path bytes. Each value is framed as
//! `[flag][blake3 digest (32)][body]`, where the flag says whether the body
//! is LZ4 compressed and the digest covers the uncompressed payload.

use async_trait::async_trait;
use bytes::Bytes;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use sled::Db;
use stash_core::{Cache, CacheError, CacheLookup, CacheResult, Payload, StoragePath};
use std::path::PathBuf;
use tracing::debug;

const FLAG_RAW: u8 = 0;
const FLAG_LZ4: u8 = 1;
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = 1 + DIGEST_LEN;
/// Upper bound of LZ4 block expansion (one input byte per 255 output bytes)
const MAX_LZ4_RATIO: usize = 255;
const LZ4_SLACK: usize = 16;

/// Sled cache configuration
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// Database path
    pub path: PathBuf,
    /// Compress entries with LZ4
    pub compress: bool,
    /// Minimum payload size to compress (bytes)
    pub compress_threshold: usize,
    /// Verify the digest of every entry read back
    pub verify_on_read: bool,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        let cache_dir = directories::ProjectDirs::from("com", "stash", "stash")
            .map(|d| d.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/tmp/stash-cache"));

        Self {
            path: cache_dir.join("cache.db"),
            compress: true,
            compress_threshold: 1024, // 1KB
            verify_on_read: true,
        }
    }
}

/// Persistent cache on a sled database
pub struct SledCache {
    config: SledCacheConfig,
    db: Db,
}

impl SledCache {
    /// Open or create the database at `config.path`
    pub fn open(config: SledCacheConfig) -> CacheResult<Self> {
        let db = sled::open(&config.path).map_err(|e| CacheError::Database(e.to_string()))?;
        debug!(path = %config.path.display(), "opened sled cache");
        Ok(Self { config, db })
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Flush to disk
    pub fn flush(&self) -> CacheResult<()> {
        self.db
            .flush()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }

    /// Clear all entries
    pub fn clear(&self) -> CacheResult<()> {
        self.db
            .clear()
            .map_err(|e| CacheError::Database(e.to_string()))
    }

    fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let digest = blake3::hash(payload);

        let compressed = if self.config.compress && payload.len() >= self.config.compress_threshold {
            // Only keep the compressed form if it's smaller
            Some(compress_prepend_size(payload)).filter(|c| c.len() < payload.len())
        } else {
            None
        };

        let (flag, body) = match &compressed {
            Some(c) => (FLAG_LZ4, c.as_slice()),
            None => (FLAG_RAW, payload),
        };

        let mut framed = Vec::with_capacity(HEADER_LEN + body.len());
        framed.push(flag);
        framed.extend_from_slice(digest.as_bytes());
        framed.extend_from_slice(body);
        framed
    }

    fn decode(&self, path: &StoragePath, framed: &[u8]) -> CacheResult<Payload> {
        if framed.len() < HEADER_LEN {
            return Err(CacheError::Corrupted(format!("{path}: truncated entry")));
        }
        let (header, body) = framed.split_at(HEADER_LEN);

        let payload = match header[0] {
            FLAG_RAW => body.to_vec(),
            FLAG_LZ4 => {
                check_lz4_size(path, body)?;
                decompress_size_prepended(body)
                    .map_err(|e| CacheError::Corrupted(format!("{path}: {e}")))?
            }
            flag => {
                return Err(CacheError::Corrupted(format!("{path}: unknown flag {flag}")));
            }
        };

        if self.config.verify_on_read && blake3::hash(&payload).as_bytes()[..] != header[1..] {
            return Err(CacheError::Corrupted(format!("{path}: digest mismatch")));
        }

        Ok(Bytes::from(payload))
    }
}

/// Reject a size prefix the compressed body could not possibly expand to
fn check_lz4_size(path: &StoragePath, body: &[u8]) -> CacheResult<()> {
    if body.len() < 4 {
        return Err(CacheError::Corrupted(format!("{path}: truncated lz4 body")));
    }
    let (prefix, block) = body.split_at(4);
    let claimed = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if claimed > block.len().saturating_mul(MAX_LZ4_RATIO).saturating_add(LZ4_SLACK) {
        return Err(CacheError::Corrupted(format!(
            "{path}: lz4 size {claimed} exceeds what {} bytes can hold",
            block.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl Cache for SledCache {
    async fn lookup(&self, path: &StoragePath) -> CacheResult<CacheLookup> {
        let raw = self
            .db
            .get(path.as_bytes())
            .map_err(|e| CacheError::Database(e.to_string()))?;

        match raw {
            Some(framed) => Ok(CacheLookup::Hit(self.decode(path, &framed)?)),
            None => Ok(CacheLookup::Miss),
        }
    }

    async fn store(&self, path: &StoragePath, payload: Payload) -> CacheResult<()> {
        let framed = self.encode(&payload);
        self.db
            .insert(path.as_bytes(), framed)
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, path: &StoragePath) -> CacheResult<bool> {
        self.db
            .contains_key(path.as_bytes())
            .map_err(|e| CacheError::Database(e.to_string()))
    }

    async fn evict(&self, path: &StoragePath) -> CacheResult<()> {
        self.db
            .remove(path.as_bytes())
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp(dir: &tempfile::TempDir, compress: bool) -> SledCache {
        SledCache::open(SledCacheConfig {
            path: dir.path().join("cache.db"),
            compress,
            compress_threshold: 16,
            verify_on_read: true,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_lookup_evict() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, true);
        let path = StoragePath::new("foo/bar");

        assert_eq!(cache.lookup(&path).await.unwrap(), CacheLookup::Miss);

        cache.store(&path, Bytes::from("baz")).await.unwrap();
        assert!(cache.exists(&path).await.unwrap());
        assert_eq!(cache.lookup(&path).await.unwrap(), CacheLookup::Hit(Bytes::from("baz")));

        cache.evict(&path).await.unwrap();
        cache.evict(&path).await.unwrap();
        assert!(!cache.exists(&path).await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_compressible_payload_is_framed_lz4() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, true);
        let path = StoragePath::new("big");
        let payload = Bytes::from(vec![b'a'; 4096]);

        cache.store(&path, payload.clone()).await.unwrap();

        let raw = cache.db.get(path.as_bytes()).unwrap().unwrap();
        assert_eq!(raw[0], FLAG_LZ4);
        assert!(raw.len() < payload.len());
        assert_eq!(cache.lookup(&path).await.unwrap(), CacheLookup::Hit(payload));
    }

    #[tokio::test]
    async fn test_small_payload_stays_raw() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, true);
        let path = StoragePath::new("small");

        cache.store(&path, Bytes::from("tiny")).await.unwrap();
        let raw = cache.db.get(path.as_bytes()).unwrap().unwrap();
        assert_eq!(raw[0], FLAG_RAW);
        assert_eq!(&raw[HEADER_LEN..], b"tiny");
    }

    #[tokio::test]
    async fn test_corruption_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, false);
        let path = StoragePath::new("victim");

        cache.store(&path, Bytes::from("original")).await.unwrap();
        let mut raw = cache.db.get(path.as_bytes()).unwrap().unwrap().to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        cache.db.insert(path.as_bytes(), raw).unwrap();

        let err = cache.lookup(&path).await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupted(_)));

        cache.db.insert(path.as_bytes(), &[FLAG_RAW][..]).unwrap();
        assert!(matches!(cache.lookup(&path).await, Err(CacheError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_implausible_lz4_size_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, true);
        let path = StoragePath::new("inflated");

        cache.store(&path, Bytes::from(vec![b'z'; 4096])).await.unwrap();
        let mut raw = cache.db.get(path.as_bytes()).unwrap().unwrap().to_vec();
        assert_eq!(raw[0], FLAG_LZ4);
        raw[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        cache.db.insert(path.as_bytes(), raw).unwrap();

        let err = cache.lookup(&path).await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupted(ref m) if m.contains("exceeds")));

        let mut short = vec![FLAG_LZ4];
        short.extend_from_slice(&[0u8; DIGEST_LEN]);
        short.extend_from_slice(&[1, 0]);
        cache.db.insert(path.as_bytes(), short).unwrap();
        assert!(matches!(cache.lookup(&path).await, Err(CacheError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_keys_are_exact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_temp(&dir, false);

        cache.store(&StoragePath::new("a/b"), Bytes::from("1")).await.unwrap();
        assert!(!cache.exists(&StoragePath::new("/a/b")).await.unwrap());
        assert!(!cache.exists(&StoragePath::new("a//b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = StoragePath::new("kept");
        {
            let cache = open_temp(&dir, true);
            cache.store(&path, Bytes::from("value")).await.unwrap();
            cache.flush().unwrap();
        }
        let cache = open_temp(&dir, true);
        assert_eq!(cache.lookup(&path).await.unwrap(), CacheLookup::Hit(Bytes::from("value")));
    }
}
