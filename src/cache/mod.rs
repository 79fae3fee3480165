//! Cache Module
//!
//! Two-tier caching: an in-memory index with TTL expiration and pluggable eviction,
//! written through to a durable store.

mod entry;
mod eviction;
mod key_locks;
mod stats;
mod store;
mod tiered;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::EvictionPolicy;
pub use key_locks::KeyLocks;
pub use stats::CacheStats;
pub use store::{CacheStore, EvictedEntry, Lookup};
pub use tiered::TieredCache;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
