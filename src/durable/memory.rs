//! In-memory durable store
//!
//! HashMap-backed table for tests and for running without persistence. It can be
//! switched into a failing mode to simulate a durable-store outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DurableStore, EntryMetadata, StoreError, StoreResult, StoredEntry};

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, StoredEntry>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of rows held.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        self.check_available()?;
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: &[u8], metadata: &EntryMetadata) -> StoreResult<()> {
        self.check_available()?;
        let entry = StoredEntry {
            key: key.to_string(),
            data: data.to_vec(),
            metadata: metadata.clone(),
        };
        self.rows.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.rows.write().await.remove(key);
        Ok(())
    }

    async fn list_expired(&self, now_ms: u64) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let rows = self.rows.read().await;
        let mut keys: Vec<String> = rows
            .values()
            .filter(|entry| entry.metadata.is_expired_at(now_ms))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.check_available()?;
        self.rows.write().await.clear();
        Ok(())
    }

    async fn load_all(&self) -> StoreResult<Vec<StoredEntry>> {
        self.check_available()?;
        Ok(self.rows.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(expires_at: Option<u64>) -> EntryMetadata {
        EntryMetadata {
            expires_at,
            last_accessed: 1,
            access_count: 0,
            size_bytes: 3,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("a", b"abc", &metadata(None)).await.unwrap();

        let row = store.get("a").await.unwrap().unwrap();
        assert_eq!(row.data, b"abc");
        assert_eq!(row.key, "a");

        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        // Idempotent
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_expired() {
        let store = MemoryStore::new();
        store.put("old", b"1", &metadata(Some(10))).await.unwrap();
        store.put("new", b"2", &metadata(Some(1_000))).await.unwrap();
        store.put("forever", b"3", &metadata(None)).await.unwrap();

        assert_eq!(store.list_expired(500).await.unwrap(), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MemoryStore::new();
        store.set_failing(true);

        assert!(matches!(
            store.put("a", b"x", &metadata(None)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.get("a").await.is_err());

        store.set_failing(false);
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryStore::new();
        store.put("a", b"1", &metadata(None)).await.unwrap();
        store.put("b", b"2", &metadata(None)).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
