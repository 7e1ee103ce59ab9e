// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration file handling
//!
//! A TOML file selects the storage and cache backends. Every key is
//! optional; missing sections fall back to the defaults below.

use serde::{Deserialize, Serialize};
use stash_cache::{MemoryCache, NullCache, SledCache, SledCacheConfig};
use stash_coord::CacheCoordinator;
use stash_core::{Cache, Storage};
use stash_providers::{LocalStorage, MemoryStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

const CONFIG_FILE: &str = "config.toml";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "stash", "stash")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Sled,
    Memory,
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root directory of the local backend
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = project_dirs()
            .map(|d| d.data_dir().join("store"))
            .unwrap_or_else(|| PathBuf::from("/tmp/stash-store"));
        Self { backend: StorageBackendKind::default(), root }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Database path of the sled backend
    pub path: PathBuf,
    /// Maximum entries of the memory backend
    pub capacity: usize,
    pub compress: bool,
    pub compress_threshold: usize,
    pub verify_on_read: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let sled = SledCacheConfig::default();
        Self {
            backend: CacheBackendKind::default(),
            path: sled.path,
            capacity: 10_000,
            compress: sled.compress,
            compress_threshold: sled.compress_threshold,
            verify_on_read: sled.verify_on_read,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing-subscriber` filter directive, e.g. `"info"` or `"stash_coord=debug"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

impl StashConfig {
    /// Platform config location, e.g. `~/.config/stash/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
    }

    /// Load from an explicit file, or from the default location if present.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> CliResult<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(CliError::ConfigNotFound(path.to_path_buf()));
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    debug!("no config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content).map_err(|e| CliError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> CliResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn build_storage(&self) -> Arc<dyn Storage> {
        match self.storage.backend {
            StorageBackendKind::Local => Arc::new(LocalStorage::new("local", &self.storage.root)),
            StorageBackendKind::Memory => Arc::new(MemoryStorage::new()),
        }
    }

    /// Cache backend actually used.
    ///
    /// A persistent cache must not outlive its storage, so memory storage
    /// downgrades `sled` to an in-process cache.
    pub fn effective_cache_backend(&self) -> CacheBackendKind {
        match (self.storage.backend, self.cache.backend) {
            (StorageBackendKind::Memory, CacheBackendKind::Sled) => {
                warn!("memory storage does not persist, using a memory cache instead of sled");
                CacheBackendKind::Memory
            }
            (_, backend) => backend,
        }
    }

    /// Build the configured cache.
    ///
    /// A cache that cannot be opened is replaced by [`NullCache`]: an
    /// unavailable cache never stops storage operations.
    pub fn build_cache(&self) -> Arc<dyn Cache> {
        match self.effective_cache_backend() {
            CacheBackendKind::Sled => {
                let sled_config = SledCacheConfig {
                    path: self.cache.path.clone(),
                    compress: self.cache.compress,
                    compress_threshold: self.cache.compress_threshold,
                    verify_on_read: self.cache.verify_on_read,
                };
                match SledCache::open(sled_config) {
                    Ok(cache) => Arc::new(cache),
                    Err(e) => {
                        warn!(path = %self.cache.path.display(), error = %e, "cache unavailable, running uncached");
                        Arc::new(NullCache)
                    }
                }
            }
            CacheBackendKind::Memory => Arc::new(MemoryCache::new(self.cache.capacity)),
            CacheBackendKind::Disabled => Arc::new(NullCache),
        }
    }

    pub fn build_coordinator(&self) -> CacheCoordinator {
        CacheCoordinator::new(self.build_storage(), self.build_cache())
    }
}
