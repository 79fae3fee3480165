//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and tier usage.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads served from the in-memory tier
    pub hits: u64,
    /// Reads served by re-materializing from the durable tier
    pub durable_hits: u64,
    /// Reads that found nothing in either tier
    pub misses: u64,
    /// Entries removed to satisfy the size budget
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Durable tier operations that failed and were absorbed
    pub store_errors: u64,
    /// Current number of resident entries
    pub total_entries: usize,
    /// Sum of resident entry sizes
    pub total_size_bytes: u64,
    /// Configured budget
    pub max_size_bytes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns (hits + durable_hits) / (hits + durable_hits + misses), or 0.0 if
    /// no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.durable_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Durable Hit ==
    /// Increments the durable-tier hit counter.
    pub fn record_durable_hit(&mut self) {
        self.durable_hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Expiration ==
    /// Increments the expiration counter.
    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Record Store Error ==
    /// Increments the absorbed durable-error counter.
    pub fn record_store_error(&mut self) {
        self.store_errors += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_size_bytes, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_durable_hits() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_durable_hit();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_hit_rate_all_misses() {
        let mut stats = CacheStats::new();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_expiration();
        stats.record_store_error();
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.store_errors, 1);
    }
}
