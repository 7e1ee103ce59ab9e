// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use bytes::Bytes;
use chrono::{DateTime, Utc};
use console::style;
use futures::TryStreamExt;
use serde::Serialize;
use stash_coord::CacheCoordinator;
use stash_core::{StorageError, StoragePath};
use std::io::Write;
use std::path::Path;
use tabled::{Table, Tabled};
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::config::StashConfig;
use crate::error::CliResult;

/// Format a timestamp for display
fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Print a payload to stdout
pub async fn get(coordinator: &CacheCoordinator, path: &str) -> CliResult<()> {
    let key = StoragePath::new(path);
    let payload = coordinator
        .get(&key)
        .await?
        .ok_or_else(|| StorageError::NotFound(path.to_string()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&payload)?;
    stdout.flush()?;
    Ok(())
}

/// Store a payload from an argument, a file, or stdin
pub async fn set(
    coordinator: &CacheCoordinator,
    path: &str,
    value: Option<String>,
    file: Option<&Path>,
) -> CliResult<()> {
    let payload = match (value, file) {
        (Some(value), _) => Bytes::from(value),
        (None, Some(file)) => Bytes::from(tokio::fs::read(file).await?),
        (None, None) => {
            let mut buffer = Vec::new();
            tokio::io::stdin().read_to_end(&mut buffer).await?;
            Bytes::from(buffer)
        }
    };

    let size = payload.len() as u64;
    coordinator.set(&StoragePath::new(path), payload).await?;
    info!(path, size, "stored");
    println!("Stored {} at {}", bytesize::ByteSize(size), path);
    Ok(())
}

/// Report whether a path exists
pub async fn contains(coordinator: &CacheCoordinator, path: &str) -> CliResult<bool> {
    let found = coordinator.contains(&StoragePath::new(path)).await?;
    if found {
        println!("{}", style("present").green());
    } else {
        println!("{}", style("absent").red());
    }
    Ok(found)
}

/// Move/rename a path
pub async fn mv(coordinator: &CacheCoordinator, source: &str, dest: &str) -> CliResult<()> {
    coordinator
        .move_to(&StoragePath::new(source), &StoragePath::new(dest))
        .await?;
    println!("Moved {} -> {}", source, dest);
    Ok(())
}

/// Copy a path
pub async fn cp(coordinator: &CacheCoordinator, source: &str, dest: &str) -> CliResult<()> {
    coordinator
        .copy_to(&StoragePath::new(source), &StoragePath::new(dest))
        .await?;
    println!("Copied {} -> {}", source, dest);
    Ok(())
}

/// Remove paths
pub async fn rm(coordinator: &CacheCoordinator, paths: &[String]) -> CliResult<()> {
    for path in paths {
        coordinator.remove(&StoragePath::new(path.as_str())).await?;
        println!("Removed {}", path);
    }
    Ok(())
}

/// Touch paths
pub async fn touch(coordinator: &CacheCoordinator, paths: &[String]) -> CliResult<()> {
    for path in paths {
        coordinator.touch(&StoragePath::new(path.as_str())).await?;
    }
    Ok(())
}

#[derive(Tabled, Serialize)]
struct LsEntry {
    #[tabled(rename = "Modified")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[tabled(display_with = "display_modified")]
    modified: Option<DateTime<Utc>>,
    #[tabled(rename = "Path")]
    path: String,
}

fn display_modified(modified: &Option<DateTime<Utc>>) -> String {
    format_time(*modified)
}

/// List the children of a path
pub async fn ls(coordinator: &CacheCoordinator, path: &str, long: bool, json: bool) -> CliResult<()> {
    let stream = coordinator.scan(&StoragePath::new(path)).await?;
    let mut children: Vec<StoragePath> = stream.try_collect().await?;
    children.sort();

    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        let modified = if long {
            coordinator.modified(&child).await.ok()
        } else {
            None
        };
        entries.push(LsEntry { modified, path: child.into_string() });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("(empty directory)");
    } else if long {
        println!("{}", Table::new(entries));
    } else {
        for entry in entries {
            println!("{}", entry.path);
        }
    }
    Ok(())
}

/// Show path information
pub async fn stat(coordinator: &CacheCoordinator, path: &str) -> CliResult<()> {
    let key = StoragePath::new(path);
    let modified = coordinator.modified(&key).await?;

    println!("  Path: {}", key);
    println!("  Storage: {}", coordinator.storage().id());
    if let Some(payload) = coordinator.get(&key).await? {
        let size = payload.len() as u64;
        println!("  Size: {} ({})", size, bytesize::ByteSize(size));
    }
    println!("  Modified: {}", modified);
    Ok(())
}

/// Print the effective configuration
pub fn config(config: &StashConfig) -> CliResult<()> {
    if let Some(path) = StashConfig::default_path() {
        println!("# default location: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
