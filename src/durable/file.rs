//! File-backed durable store
//!
//! One JSON record per key inside a directory. File names are the SHA-256 of the key
//! so arbitrary keys map to safe, fixed-length names. Every write lands in a unique
//! temp file and is renamed over the record, which keeps concurrent writers to
//! distinct keys independent and makes same-key writes last-writer-wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DurableStore, EntryMetadata, StoreResult, StoredEntry};

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root
            .join(format!("{}.{}", hex::encode(digest), RECORD_EXTENSION))
    }

    async fn read_record(path: &Path) -> StoreResult<Option<StoredEntry>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads every record file, skipping (and logging) the ones that cannot be parsed.
    async fn scan(&self) -> StoreResult<Vec<StoredEntry>> {
        let mut rows = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(row)) => rows.push(row),
                // Removed between listing and reading
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        let row = Self::read_record(&self.record_path(key)).await?;
        Ok(row.filter(|row| row.key == key))
    }

    async fn put(&self, key: &str, data: &[u8], metadata: &EntryMetadata) -> StoreResult<()> {
        let row = StoredEntry {
            key: key.to_string(),
            data: data.to_vec(),
            metadata: metadata.clone(),
        };
        let bytes = serde_json::to_vec(&row)?;

        let target = self.record_path(key);
        let temp = target.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let written = match fs::write(&temp, &bytes).await {
            Ok(()) => fs::rename(&temp, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_expired(&self, now_ms: u64) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .scan()
            .await?
            .into_iter()
            .filter(|row| row.metadata.is_expired_at(now_ms))
            .map(|row| row.key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> StoreResult<()> {
        for row in self.scan().await? {
            self.delete(&row.key).await?;
        }
        Ok(())
    }

    async fn load_all(&self) -> StoreResult<Vec<StoredEntry>> {
        self.scan().await
    }
}
