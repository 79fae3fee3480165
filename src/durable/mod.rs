//! Durable Store Module
//!
//! The durable tier behind the cache: a generic key/value table of opaque bytes plus
//! the metadata needed to rebuild a cache entry on reload. No cache logic lives here.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Store Error ==
/// Failure of the durable tier. Callers of the cache never see this directly.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Entry Metadata ==
/// Metadata persisted next to each value (timestamps in Unix milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub expires_at: Option<u64>,
    pub last_accessed: u64,
    pub access_count: u64,
    pub size_bytes: u64,
}

impl EntryMetadata {
    /// Expired when `now >= expires_at`; entries without expiry never expire.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|expires| now_ms >= expires)
    }
}

// == Stored Entry ==
/// One row of the durable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub metadata: EntryMetadata,
}

// == Durable Store Trait ==
/// Key/value table the cache persists into.
///
/// Implementations must tolerate concurrent writes to distinct keys; concurrent
/// writes to the same key are last-writer-wins.
#[async_trait]
pub trait DurableStore: Send + Sync + std::fmt::Debug {
    /// Fetches a row, `None` if the key has never been written or was deleted.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>>;

    /// Inserts or replaces a row.
    async fn put(&self, key: &str, data: &[u8], metadata: &EntryMetadata) -> StoreResult<()>;

    /// Removes a row. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Keys whose `expires_at` is at or before `now_ms`.
    async fn list_expired(&self, now_ms: u64) -> StoreResult<Vec<String>>;

    /// Removes every row.
    async fn clear(&self) -> StoreResult<()>;

    /// Every row currently stored, in no particular order.
    async fn load_all(&self) -> StoreResult<Vec<StoredEntry>>;
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
