// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage path key
//!
//! A `StoragePath` is the single key both the storage and the cache are
//! addressed by. Equality is exact string equality: no normalization is ever
//! applied, so `"a/b"`, `"/a/b"` and `"a//b"` are three different keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between hierarchy levels
pub const SEPARATOR: char = '/';

/// Hierarchical, opaque path shared by storage and cache
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The root of the hierarchy (the empty path)
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact key bytes. Collaborators keying by bytes must use these.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True for the empty path and for a path made only of separators
    pub fn is_root(&self) -> bool {
        self.segments().next().is_none()
    }

    /// Non-empty components, for collaborators that map onto a directory tree
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last component
    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn extension(&self) -> Option<&str> {
        self.name()
            .and_then(|n| n.rsplit_once('.'))
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext)
    }

    /// Everything before the last separator, or the root for a single-level path
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches(SEPARATOR);
        match trimmed.rfind(SEPARATOR) {
            Some(idx) => Some(Self(trimmed[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Child path: `self + "/" + name`, or `name` itself at the root.
    ///
    /// `name` is appended verbatim; `.` and `..` carry no special meaning.
    pub fn join(&self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if self.0.is_empty() {
            Self(name.to_string())
        } else if self.0.ends_with(SEPARATOR) {
            Self(format!("{}{}", self.0, name))
        } else {
            Self(format!("{}{}{}", self.0, SEPARATOR, name))
        }
    }

    /// Whether `other` is an immediate child of `self` in the `join` sense
    pub fn is_parent_of(&self, other: &StoragePath) -> bool {
        let rest = if self.0.is_empty() {
            other.as_str()
        } else if self.0.ends_with(SEPARATOR) {
            match other.as_str().strip_prefix(self.as_str()) {
                Some(rest) => rest,
                None => return false,
            }
        } else {
            match other
                .as_str()
                .strip_prefix(self.as_str())
                .and_then(|r| r.strip_prefix(SEPARATOR))
            {
                Some(rest) => rest,
                None => return false,
            }
        };
        !rest.is_empty() && !rest.contains(SEPARATOR)
    }

    /// Prefix every descendant key starts with
    pub fn descendant_prefix(&self) -> String {
        if self.0.is_empty() || self.0.ends_with(SEPARATOR) {
            self.0.clone()
        } else {
            format!("{}{}", self.0, SEPARATOR)
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StoragePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StoragePath {
    fn from(s: String) -> Self {
        Self(s)
    }
}
