//! Eviction Policy Module
//!
//! Victim selection for the size budget. Each policy orders resident entries by a
//! single rank; ties fall back to the smallest key so eviction is deterministic.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;

// == Eviction Policy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used first
    Lru,
    /// Least frequently used first
    Lfu,
    /// Oldest insertion first
    Fifo,
}

impl EvictionPolicy {
    fn rank(self, entry: &CacheEntry) -> u64 {
        match self {
            EvictionPolicy::Lru => entry.access_tick,
            EvictionPolicy::Lfu => entry.access_count,
            EvictionPolicy::Fifo => entry.inserted_seq,
        }
    }

    // == Select Victim ==
    /// Picks the next entry to evict, never choosing `protect`.
    ///
    /// Returns None when no candidate is left.
    pub fn select_victim(
        self,
        entries: &HashMap<String, CacheEntry>,
        protect: Option<&str>,
    ) -> Option<String> {
        entries
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != protect)
            .min_by(|(ka, a), (kb, b)| {
                self.rank(a)
                    .cmp(&self.rank(b))
                    .then_with(|| ka.cmp(kb))
            })
            .map(|(key, _)| key.clone())
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
        };
        f.write_str(name)
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(format!("unknown eviction policy: {}", other)),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(inserted_seq: u64, access_tick: u64, access_count: u64) -> CacheEntry {
        let mut entry = CacheEntry::new(json!(null), 4, None, inserted_seq);
        entry.access_tick = access_tick;
        entry.access_count = access_count;
        entry
    }

    fn sample() -> HashMap<String, CacheEntry> {
        let mut entries = HashMap::new();
        // inserted first, read most recently, read rarely
        entries.insert("a".to_string(), entry(1, 9, 1));
        // inserted second, read least recently, read often
        entries.insert("b".to_string(), entry(2, 3, 5));
        // inserted last, read in between, read often
        entries.insert("c".to_string(), entry(3, 6, 5));
        entries
    }

    #[test]
    fn test_lru_picks_least_recent() {
        assert_eq!(
            EvictionPolicy::Lru.select_victim(&sample(), None),
            Some("b".to_string())
        );
    }

    #[test]
    fn test_lfu_picks_least_frequent() {
        assert_eq!(
            EvictionPolicy::Lfu.select_victim(&sample(), None),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_fifo_ignores_reads() {
        assert_eq!(
            EvictionPolicy::Fifo.select_victim(&sample(), None),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_ties_break_on_smallest_key() {
        let mut entries = HashMap::new();
        entries.insert("zeta".to_string(), entry(1, 1, 0));
        entries.insert("alpha".to_string(), entry(2, 2, 0));

        assert_eq!(
            EvictionPolicy::Lfu.select_victim(&entries, None),
            Some("alpha".to_string())
        );
    }

    #[test]
    fn test_protected_key_is_never_chosen() {
        assert_eq!(
            EvictionPolicy::Lru.select_victim(&sample(), Some("b")),
            Some("c".to_string())
        );

        let mut single = HashMap::new();
        single.insert("only".to_string(), entry(1, 1, 0));
        assert_eq!(EvictionPolicy::Fifo.select_victim(&single, Some("only")), None);
    }

    #[test]
    fn test_select_from_empty() {
        assert_eq!(EvictionPolicy::Lru.select_victim(&HashMap::new(), None), None);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("LRU".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Lru));
        assert_eq!(" fifo ".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Fifo));
        assert!("random".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::Lfu.to_string(), "lfu");
        assert_eq!(
            serde_json::to_string(&EvictionPolicy::Fifo).unwrap(),
            "\"fifo\""
        );
    }
}
