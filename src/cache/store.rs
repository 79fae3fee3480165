//! Cache Store Module
//!
//! The in-memory tier: a HashMap index with a byte budget, TTL expiration and
//! policy-driven eviction. `total_size_bytes` is maintained incrementally on every
//! insert, removal and eviction.

use std::collections::HashMap;

use serde_json::Value;

use crate::cache::{CacheEntry, CacheStats, EvictionPolicy, MAX_KEY_LENGTH};
use crate::durable::EntryMetadata;
use crate::error::{Error, Result};

// == Lookup ==
/// Outcome of a read against the in-memory tier.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Value),
    /// Present but past its TTL; removed from memory by the read
    Expired,
    Miss,
}

/// An entry removed to satisfy the size budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedEntry {
    pub key: String,
    pub size_bytes: u64,
}

// == Cache Store ==
/// In-memory cache index with a byte budget.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Victim selection policy
    policy: EvictionPolicy,
    /// Byte budget
    max_size_bytes: u64,
    /// Sum of `size_bytes` over `entries`
    total_size_bytes: u64,
    /// Logical clock for insertion order and recency
    clock: u64,
    /// Performance statistics
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given budget and eviction policy.
    pub fn new(max_size_bytes: u64, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            max_size_bytes,
            total_size_bytes: 0,
            clock: 0,
            stats: CacheStats::new(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // == Validate Key ==
    pub fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidRequest("Key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(Error::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }

    // == Set ==
    /// Stores a value, replacing any previous entry under the same key.
    ///
    /// Overwrites reset the access count and count as a fresh insertion. Afterwards
    /// other entries are evicted until the budget holds again; the evicted entries
    /// are returned so the caller can drop them from the durable tier.
    ///
    /// # Errors
    /// - `InvalidRequest` for empty or oversized keys
    /// - `CapacityExceeded` if `size_bytes` alone is larger than the budget
    pub fn set(
        &mut self,
        key: String,
        value: Value,
        size_bytes: u64,
        ttl_seconds: Option<u64>,
    ) -> Result<Vec<EvictedEntry>> {
        Self::validate_key(&key)?;

        if size_bytes > self.max_size_bytes {
            return Err(Error::CapacityExceeded {
                key,
                size_bytes,
                max_size_bytes: self.max_size_bytes,
            });
        }

        let tick = self.tick();
        let entry = CacheEntry::new(value, size_bytes, ttl_seconds, tick);
        self.insert_entry(key.clone(), entry);

        Ok(self.enforce_limit(Some(&key)))
    }

    fn insert_entry(&mut self, key: String, entry: CacheEntry) {
        self.total_size_bytes += entry.size_bytes;
        if let Some(previous) = self.entries.insert(key, entry) {
            self.total_size_bytes -= previous.size_bytes;
        }
    }

    // == Get ==
    /// Reads a value, updating recency and frequency on a hit.
    ///
    /// Expired entries are dropped from memory and reported as `Lookup::Expired`;
    /// they are never returned.
    pub fn get(&mut self, key: &str) -> Lookup {
        let expired = match self.entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.remove(key);
            self.stats.record_expiration();
            return Lookup::Expired;
        }

        let tick = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(tick);
                self.stats.record_hit();
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Read-only view of a resident entry; does not count as an access.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Restore ==
    /// Re-materializes an entry fetched from the durable tier.
    ///
    /// Returns None (and leaves memory untouched) when the key is already resident,
    /// the row is expired, or the row alone exceeds the budget. Otherwise returns
    /// whatever had to be evicted to make room.
    pub fn restore(
        &mut self,
        key: String,
        value: Value,
        metadata: &EntryMetadata,
    ) -> Option<Vec<EvictedEntry>> {
        if self.entries.contains_key(&key)
            || metadata.size_bytes > self.max_size_bytes
            || metadata.is_expired_at(crate::cache::current_timestamp_ms())
        {
            return None;
        }

        let tick = self.tick();
        let entry = CacheEntry::restore(value, metadata, tick);
        self.insert_entry(key.clone(), entry);

        Some(self.enforce_limit(Some(&key)))
    }

    // == Remove ==
    /// Removes an entry by key.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if let Some(entry) = &removed {
            self.total_size_bytes -= entry.size_bytes;
        }
        removed
    }

    // == Clear ==
    /// Drops every entry, returning how many were resident.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.total_size_bytes = 0;
        count
    }

    // == Remove Expired ==
    /// Removes all expired entries, returning their keys.
    pub fn remove_expired(&mut self) -> Vec<String> {
        let now = crate::cache::current_timestamp_ms();
        let mut expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        expired_keys.sort();

        for key in &expired_keys {
            self.remove(key);
            self.stats.record_expiration();
        }

        expired_keys
    }

    // == Enforce Limit ==
    /// Evicts entries per policy until `total_size_bytes <= max_size_bytes`.
    ///
    /// `protect` is excluded from selection, so a write never evicts itself.
    pub fn enforce_limit(&mut self, protect: Option<&str>) -> Vec<EvictedEntry> {
        let mut evicted = Vec::new();

        while self.total_size_bytes > self.max_size_bytes {
            let Some(victim) = self.policy.select_victim(&self.entries, protect) else {
                break;
            };
            if let Some(entry) = self.remove(&victim) {
                self.stats.record_eviction();
                evicted.push(EvictedEntry {
                    key: victim,
                    size_bytes: entry.size_bytes,
                });
            }
        }

        evicted
    }

    // == Integrity ==
    /// Full-scan check that the running size total matches the resident entries.
    pub fn verify_integrity(&self) -> bool {
        let scanned: u64 = self.entries.values().map(|e| e.size_bytes).sum();
        scanned == self.total_size_bytes
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.total_size_bytes = self.total_size_bytes;
        stats.max_size_bytes = self.max_size_bytes;
        stats
    }

    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    pub fn record_durable_hit(&mut self) {
        self.stats.record_durable_hit();
    }

    pub fn record_store_error(&mut self) {
        self.stats.record_store_error();
    }

    pub fn record_expiration(&mut self) {
        self.stats.record_expiration();
    }

    // == Accessors ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Resident keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
