//! Backup Task
//!
//! Periodically writes every durable row to a timestamped JSON file and keeps only
//! the newest `retention` backups.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::TieredCache;
use crate::durable::{StoreError, StoredEntry};
use crate::error::Result;

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_SUFFIX: &str = ".json";

/// Contents of one backup file.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub created_at: DateTime<Utc>,
    pub entries: Vec<StoredEntry>,
}

// == Backup Rotator ==
#[derive(Debug, Clone)]
pub struct BackupRotator {
    dir: PathBuf,
    /// Backups kept after rotation; `0` keeps all of them
    retention: usize,
}

impl BackupRotator {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a snapshot of the durable tier and returns its path.
    pub async fn create_backup(&self, cache: &TieredCache) -> Result<PathBuf> {
        let entries = cache.snapshot().await?;
        let created_at = Utc::now();
        let backup = BackupFile {
            created_at,
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&backup).map_err(StoreError::from)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(StoreError::from)?;
        // Millisecond timestamps keep names unique and lexically ordered
        let name = format!(
            "{}{}{}",
            BACKUP_PREFIX,
            created_at.format("%Y%m%dT%H%M%S%3fZ"),
            BACKUP_SUFFIX
        );
        let path = self.dir.join(name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes).await.map_err(StoreError::from)?;
        fs::rename(&tmp, &path).await.map_err(StoreError::from)?;

        info!(
            path = %path.display(),
            entries = backup.entries.len(),
            "Backup written"
        );
        Ok(path)
    }

    /// Backup files in the directory, oldest first.
    pub async fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let mut backups = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(StoreError::from(e).into()),
        };

        while let Some(item) = dir.next_entry().await.map_err(StoreError::from)? {
            let is_backup = item
                .file_name()
                .to_str()
                .map_or(false, |name| {
                    name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX)
                });
            if is_backup {
                backups.push(item.path());
            }
        }

        backups.sort();
        Ok(backups)
    }

    /// Deletes the oldest backups beyond the retention count. Returns how many
    /// were deleted.
    pub async fn rotate(&self) -> Result<usize> {
        if self.retention == 0 {
            return Ok(0);
        }
        let backups = self.list_backups().await?;
        let excess = backups.len().saturating_sub(self.retention);

        let mut removed = 0;
        for path in backups.into_iter().take(excess) {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed old backup");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove old backup"),
            }
        }
        Ok(removed)
    }

    /// One backup followed by rotation.
    pub async fn run_once(&self, cache: &TieredCache) -> Result<PathBuf> {
        let path = self.create_backup(cache).await?;
        self.rotate().await?;
        Ok(path)
    }
}

/// Spawns the backup loop. Failures are logged and retried on the next interval.
pub fn spawn_backup_task(
    cache: Arc<TieredCache>,
    rotator: BackupRotator,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            dir = %rotator.dir().display(),
            interval_secs = interval.as_secs(),
            "Starting backup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            if let Err(e) = rotator.run_once(&cache).await {
                warn!(error = %e, "Backup failed");
            }
        }
    })
}
