//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::durable::EntryMetadata;

// == Cache Entry ==
/// Represents a single resident cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Last read or write (Unix milliseconds)
    pub last_accessed: u64,
    /// Reads since the entry was written
    pub access_count: u64,
    /// Length of the serialized value
    pub size_bytes: u64,
    /// Position in insertion order, used by FIFO
    pub inserted_seq: u64,
    /// Logical recency tick, used by LRU
    pub access_tick: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `size_bytes` - Size of the serialized value
    /// * `ttl_seconds` - Optional TTL in seconds
    /// * `tick` - Logical clock value for insertion order and recency
    pub fn new(value: Value, size_bytes: u64, ttl_seconds: Option<u64>, tick: u64) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            value,
            expires_at,
            last_accessed: now,
            access_count: 0,
            size_bytes,
            inserted_seq: tick,
            access_tick: tick,
        }
    }

    // == Restore ==
    /// Re-materializes an entry read back from the durable tier.
    ///
    /// The read that triggered the restore counts as an access.
    pub fn restore(value: Value, metadata: &EntryMetadata, tick: u64) -> Self {
        Self {
            value,
            expires_at: metadata.expires_at,
            last_accessed: current_timestamp_ms(),
            access_count: metadata.access_count.saturating_add(1),
            size_bytes: metadata.size_bytes,
            inserted_seq: tick,
            access_tick: tick,
        }
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self, tick: u64) {
        self.last_accessed = current_timestamp_ms();
        self.access_count = self.access_count.saturating_add(1);
        self.access_tick = tick;
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: An entry is considered expired when the current time
    /// is greater than or equal to the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Metadata ==
    /// Metadata persisted alongside the value in the durable tier.
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            expires_at: self.expires_at,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            size_bytes: self.size_bytes,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
