//! Key Lock Module
//!
//! A fixed set of async mutexes selected by key hash. A writer holds the lock for
//! its key across the memory update and the matching durable write, so the durable
//! row for a key always reflects the last memory change to that key.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Number of shards used by `KeyLocks::default`
pub const DEFAULT_KEY_SHARDS: usize = 64;

// == Key Locks ==
#[derive(Debug)]
pub struct KeyLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyLocks {
    // == Constructor ==
    /// Creates `num_shards` locks (at least one).
    pub fn new(num_shards: usize) -> Self {
        let shards = (0..num_shards.max(1)).map(|_| Mutex::new(())).collect();
        Self { shards }
    }

    /// Index of the shard guarding `key`.
    pub fn shard_id(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    // == Lock ==
    /// Waits for exclusive access to `key`.
    ///
    /// Callers hold at most one key lock at a time; `lock_all` is the only way
    /// to hold several.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_id(key)].lock().await
    }

    /// Takes every shard, in index order.
    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            guards.push(shard.lock().await);
        }
        guards
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_SHARDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_id_is_stable_and_in_range() {
        let locks = KeyLocks::new(8);
        for key in ["a", "user:1", "k", ""] {
            let shard = locks.shard_id(key);
            assert!(shard < 8);
            assert_eq!(shard, locks.shard_id(key));
        }
    }

    #[test]
    fn test_zero_shards_falls_back_to_one() {
        let locks = KeyLocks::new(0);
        assert_eq!(locks.shard_id("anything"), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyLocks::default();
        let guard = locks.lock("k").await;
        assert!(locks.shards[locks.shard_id("k")].try_lock().is_err());
        drop(guard);
        assert!(locks.shards[locks.shard_id("k")].try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_lock_all_blocks_every_key() {
        let locks = KeyLocks::new(4);
        let guards = locks.lock_all().await;
        assert_eq!(guards.len(), 4);
        assert!(locks.shards.iter().all(|shard| shard.try_lock().is_err()));
    }
}
