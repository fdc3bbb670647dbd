//! Filesystem-backed post queue
//!
//! Each pending entry is a directory under the posts directory. Publishing an
//! entry moves its directory, unchanged, into the archive directory. Entries
//! that repeatedly fail to load can be moved into a quarantine directory.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::error::{ConfigError, QueueError, Result};
use crate::types::EntryId;

#[derive(Debug, Clone)]
pub struct QueueStore {
    config: QueueConfig,
}

impl QueueStore {
    pub fn new(config: QueueConfig) -> Self {
        Self { config }
    }

    pub fn posts_dir(&self) -> &Path {
        &self.config.posts_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.config.archive_dir
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.config.quarantine_dir
    }

    /// Path of a pending entry's directory
    pub fn entry_path(&self, id: &EntryId) -> PathBuf {
        self.config.posts_dir.join(id.as_str())
    }

    /// Check the posts directory and create the archive and quarantine directories
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingPostsDir` if the posts directory does not
    /// exist, or `ConfigError::Directory` if a directory cannot be created.
    pub async fn ensure_dirs(&self) -> Result<()> {
        let posts_is_dir = tokio::fs::metadata(&self.config.posts_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !posts_is_dir {
            return Err(ConfigError::MissingPostsDir(self.config.posts_dir.clone()).into());
        }

        for dir in [&self.config.archive_dir, &self.config.quarantine_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::Directory {
                    path: dir.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Enumerate the entries eligible for posting
    ///
    /// Only directories count; files and hidden directories next to them are
    /// ignored. The result is sorted by name.
    pub async fn list_pending(&self) -> Result<Vec<EntryId>> {
        list_entries(&self.config.posts_dir).await
    }

    /// Enumerate the entries already archived
    pub async fn list_archived(&self) -> Result<Vec<EntryId>> {
        list_entries(&self.config.archive_dir).await
    }

    /// Pick one pending entry uniformly at random
    ///
    /// Returns `None` when the queue is empty.
    pub async fn select_random(&self) -> Result<Option<EntryId>> {
        let pending = self.list_pending().await?;
        debug!(pending = pending.len(), "selecting from pending entries");
        Ok(pending.choose(&mut rand::thread_rng()).cloned())
    }

    /// Move a pending entry into the archive directory
    ///
    /// # Errors
    ///
    /// Fails with `QueueError::DestinationExists` if an archived entry with
    /// the same name already exists. Never overwrites.
    pub async fn archive(&self, id: &EntryId) -> Result<PathBuf> {
        self.relocate(id, &self.config.archive_dir).await
    }

    /// Move a pending entry into the quarantine directory
    pub async fn quarantine(&self, id: &EntryId) -> Result<PathBuf> {
        self.relocate(id, &self.config.quarantine_dir).await
    }

    async fn relocate(&self, id: &EntryId, dest_dir: &Path) -> Result<PathBuf> {
        let from = self.entry_path(id);
        let to = dest_dir.join(id.as_str());

        if !path_exists(&from).await {
            return Err(QueueError::NotFound(id.to_string()).into());
        }
        if path_exists(&to).await {
            return Err(QueueError::DestinationExists(to).into());
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| QueueError::Move {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

        tokio::fs::rename(&from, &to)
            .await
            .map_err(|source| QueueError::Move {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;

        debug!(from = %from.display(), to = %to.display(), "moved entry");
        Ok(to)
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

async fn list_entries(dir: &Path) -> Result<Vec<EntryId>> {
    let list_error = |source: std::io::Error| QueueError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut read_dir = tokio::fs::read_dir(dir).await.map_err(list_error)?;
    let mut entries = Vec::new();

    while let Some(item) = read_dir.next_entry().await.map_err(list_error)? {
        let file_name = item.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(name = ?file_name, "skipping entry with non UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        // Follows symlinks, so a linked folder still counts as an entry
        let is_dir = tokio::fs::metadata(item.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            entries.push(EntryId::new(name));
        }
    }

    entries.sort();
    Ok(entries)
}
