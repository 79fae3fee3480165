//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from both tiers and
//! then re-applies the memory budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCache;

/// Spawns the sweep loop. The returned handle is aborted at shutdown.
pub fn spawn_sweep_task(cache: Arc<TieredCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting expiry sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let expired = cache.sweep_expired().await;
            let evicted = cache.enforce_limits().await;

            if expired > 0 || evicted > 0 {
                info!(expired, evicted, "Sweep removed entries");
            } else {
                debug!("Sweep found nothing to remove");
            }
        }
    })
}
