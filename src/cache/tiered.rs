//! Tiered Cache Module
//!
//! The cache engine: the in-memory `CacheStore` is authoritative for the lifetime
//! of the process, the `DurableStore` is written through on every `set` and read
//! only on a memory miss. Durable failures are logged and absorbed; they degrade
//! persistence, never the answers returned to callers.
//!
//! Every memory change to a key and the durable write that mirrors it happen under
//! that key's lock, so a late durable write can never outlive a later delete,
//! overwrite or eviction of the same key.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp_ms, CacheStats, CacheStore, EvictedEntry, EvictionPolicy, KeyLocks, Lookup,
};
use crate::config::Config;
use crate::durable::{DurableStore, StoredEntry};
use crate::error::{Error, Result};
use crate::events::{EventBus, ServiceEvent};

// == Tiered Cache ==
#[derive(Debug)]
pub struct TieredCache {
    /// In-memory tier
    memory: RwLock<CacheStore>,
    /// Serializes writers per key across both tiers
    key_locks: KeyLocks,
    /// Durable tier
    durable: Arc<dyn DurableStore>,
    /// Observability stream
    events: EventBus,
    /// TTL applied when `set` is called without one
    default_ttl_seconds: Option<u64>,
}

impl TieredCache {
    // == Constructor ==
    pub fn new(
        store: CacheStore,
        durable: Arc<dyn DurableStore>,
        events: EventBus,
        default_ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            memory: RwLock::new(store),
            key_locks: KeyLocks::default(),
            durable,
            events,
            default_ttl_seconds,
        }
    }

    /// Creates a cache with the budget, policy and default TTL from `config`.
    pub fn from_config(config: &Config, durable: Arc<dyn DurableStore>, events: EventBus) -> Self {
        let store = CacheStore::new(config.max_size_bytes, config.eviction_policy);
        Self::new(store, durable, events, config.default_ttl_seconds)
    }

    // == Get ==
    /// Returns the value for `key` if it is live in either tier.
    ///
    /// A durable hit is re-materialized into memory, subject to the size budget.
    /// Expired entries are never returned and are removed from both tiers.
    /// Durable read errors count as a miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let lookup = self.memory.write().await.get(key);

        match lookup {
            Lookup::Hit(value) => return Some(value),
            Lookup::Expired => {
                debug!(key, "Entry expired in memory");
                self.events.publish(ServiceEvent::EntryExpired {
                    key: key.to_string(),
                });
                self.delete_durable_if_absent(key).await;
                self.memory.write().await.record_miss();
                return None;
            }
            Lookup::Miss => {}
        }

        self.read_through(key).await
    }

    async fn read_through(&self, key: &str) -> Option<Value> {
        let guard = self.key_locks.lock(key).await;
        let row = match self.durable.get(key).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.memory.write().await.record_miss();
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Durable read failed, treating as miss");
                let mut memory = self.memory.write().await;
                memory.record_store_error();
                memory.record_miss();
                return None;
            }
        };

        if row.metadata.is_expired_at(current_timestamp_ms()) {
            debug!(key, "Durable entry expired");
            self.events.publish(ServiceEvent::EntryExpired {
                key: key.to_string(),
            });
            self.delete_durable(key).await;
            let mut memory = self.memory.write().await;
            memory.record_expiration();
            memory.record_miss();
            return None;
        }

        let value: Value = match serde_json::from_slice(&row.data) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable durable entry");
                self.delete_durable(key).await;
                let mut memory = self.memory.write().await;
                memory.record_store_error();
                memory.record_miss();
                return None;
            }
        };

        let mut metadata = row.metadata;
        metadata.size_bytes = row.data.len() as u64;

        let evicted = {
            let mut memory = self.memory.write().await;
            // A concurrent set may have landed while the durable read was in flight
            match memory.get(key) {
                Lookup::Hit(resident) => return Some(resident),
                Lookup::Expired => {
                    memory.record_miss();
                    return None;
                }
                Lookup::Miss => {}
            }
            memory.record_durable_hit();
            memory
                .restore(key.to_string(), value.clone(), &metadata)
                .unwrap_or_default()
        };
        drop(guard);

        debug!(key, "Re-materialized entry from durable tier");
        self.drop_evicted(evicted).await;
        Some(value)
    }

    // == Set ==
    /// Stores `value` under `key` in memory and writes it through to the durable tier.
    ///
    /// `ttl_seconds`: `None` applies the configured default, `Some(0)` stores without
    /// expiry. May evict other keys to stay within budget.
    ///
    /// # Errors
    /// - `InvalidRequest` for empty or oversized keys
    /// - `CapacityExceeded` when the serialized value alone exceeds the budget
    pub async fn set(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> Result<()> {
        let data = serde_json::to_vec(&value)
            .map_err(|e| Error::Internal(format!("failed to serialize value: {}", e)))?;
        let size_bytes = data.len() as u64;
        let ttl = match ttl_seconds.or(self.default_ttl_seconds) {
            Some(0) => None,
            ttl => ttl,
        };

        let guard = self.key_locks.lock(key).await;
        let (metadata, evicted) = {
            let mut memory = self.memory.write().await;
            let evicted = memory.set(key.to_string(), value, size_bytes, ttl)?;
            (memory.peek(key).map(|entry| entry.metadata()), evicted)
        };

        if let Some(metadata) = metadata {
            if let Err(e) = self.durable.put(key, &data, &metadata).await {
                warn!(key, error = %e, "Write-through failed, entry kept in memory only");
                self.memory.write().await.record_store_error();
            }
        }
        drop(guard);

        debug!(key, size_bytes, ?ttl, "Stored entry");
        self.drop_evicted(evicted).await;
        Ok(())
    }

    // == Delete ==
    /// Removes `key` from both tiers. Deleting a missing key is a no-op.
    pub async fn delete(&self, key: &str) {
        let _guard = self.key_locks.lock(key).await;
        let removed = self.memory.write().await.remove(key);
        self.delete_durable(key).await;
        if removed.is_some() {
            debug!(key, "Deleted entry");
        }
    }

    // == Clear ==
    /// Removes every entry from both tiers.
    pub async fn clear(&self) {
        let _guards = self.key_locks.lock_all().await;
        let removed = self.memory.write().await.clear();
        if let Err(e) = self.durable.clear().await {
            warn!(error = %e, "Failed to clear durable tier");
            self.memory.write().await.record_store_error();
        }
        info!(removed, "Cache cleared");
    }

    // == Sweep Expired ==
    /// Physically removes expired entries from both tiers.
    ///
    /// Returns the number of distinct keys removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut expired = self.memory.write().await.remove_expired();

        match self.durable.list_expired(current_timestamp_ms()).await {
            Ok(keys) => expired.extend(keys),
            Err(e) => {
                warn!(error = %e, "Failed to list expired durable entries");
                self.memory.write().await.record_store_error();
            }
        }
        expired.sort();
        expired.dedup();

        let mut removed = 0;
        for key in expired {
            if self.delete_durable_if_absent(&key).await {
                removed += 1;
                self.events.publish(ServiceEvent::EntryExpired { key });
            }
        }

        removed
    }

    // == Enforce Limits ==
    /// Runs an eviction pass outside of `set`. Returns the number of entries evicted.
    pub async fn enforce_limits(&self) -> usize {
        let evicted = self.memory.write().await.enforce_limit(None);
        let count = evicted.len();
        self.drop_evicted(evicted).await;
        count
    }

    // == Warm From Durable ==
    /// Loads live durable rows into memory at cold start.
    ///
    /// The most recently accessed rows are preferred; rows that do not fit in the
    /// remaining budget stay durable-only and are picked up by read-through later.
    /// Expired rows are deleted. Returns the number of entries loaded.
    pub async fn warm_from_durable(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut rows = self.durable.load_all().await?;
        rows.sort_by(|a, b| b.metadata.last_accessed.cmp(&a.metadata.last_accessed));

        let mut selected = Vec::new();
        let mut stale = Vec::new();
        {
            let memory = self.memory.read().await;
            let mut budget = memory
                .max_size_bytes()
                .saturating_sub(memory.total_size_bytes());

            for row in rows {
                if row.metadata.is_expired_at(now) {
                    stale.push(row.key);
                    continue;
                }
                let size = row.data.len() as u64;
                if size <= budget && !memory.contains_key(&row.key) {
                    budget -= size;
                    selected.push(row);
                }
            }
        }

        for key in &stale {
            self.delete_durable_if_absent(key).await;
        }

        let mut loaded = 0;
        {
            let mut memory = self.memory.write().await;
            // Oldest first so recency order survives the restart
            for row in selected.into_iter().rev() {
                let value: Value = match serde_json::from_slice(&row.data) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(key = %row.key, error = %e, "Skipping undecodable durable entry");
                        continue;
                    }
                };
                let mut metadata = row.metadata;
                metadata.size_bytes = row.data.len() as u64;
                // Warm-up is not a read
                metadata.access_count = metadata.access_count.saturating_sub(1);
                if memory.restore(row.key, value, &metadata).is_some() {
                    loaded += 1;
                }
            }
        }

        info!(loaded, expired = stale.len(), "Warmed cache from durable tier");
        Ok(loaded)
    }

    // == Snapshot ==
    /// Every row of the durable tier, for backups.
    pub async fn snapshot(&self) -> Result<Vec<StoredEntry>> {
        let mut rows = self.durable.load_all().await?;
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    // == Introspection ==
    pub async fn stats(&self) -> CacheStats {
        self.memory.read().await.stats()
    }

    pub async fn verify_integrity(&self) -> bool {
        self.memory.read().await.verify_integrity()
    }

    pub async fn len(&self) -> usize {
        self.memory.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memory.read().await.is_empty()
    }

    /// Keys resident in the in-memory tier, sorted.
    pub async fn resident_keys(&self) -> Vec<String> {
        self.memory.read().await.keys()
    }

    pub async fn policy(&self) -> EvictionPolicy {
        self.memory.read().await.policy()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // == Helpers ==
    /// Callers must hold the key lock.
    async fn delete_durable(&self, key: &str) {
        if let Err(e) = self.durable.delete(key).await {
            warn!(key, error = %e, "Failed to delete durable entry");
            self.memory.write().await.record_store_error();
        }
    }

    /// Deletes the durable row for `key` unless a newer write made it resident again.
    ///
    /// Returns false when the key was resident and the row was kept.
    async fn delete_durable_if_absent(&self, key: &str) -> bool {
        let _guard = self.key_locks.lock(key).await;
        if self.memory.read().await.contains_key(key) {
            return false;
        }
        self.delete_durable(key).await;
        true
    }

    /// Runs after the writer's own key lock is released.
    async fn drop_evicted(&self, evicted: Vec<EvictedEntry>) {
        if evicted.is_empty() {
            return;
        }
        let policy = self.memory.read().await.policy();

        for entry in evicted {
            info!(key = %entry.key, size_bytes = entry.size_bytes, %policy, "Evicted entry");
            self.delete_durable_if_absent(&entry.key).await;
            self.events.publish(ServiceEvent::EntryEvicted {
                key: entry.key,
                size_bytes: entry.size_bytes,
                policy,
            });
        }
    }
}
