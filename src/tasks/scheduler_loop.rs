//! Scheduler Loop
//!
//! Drives `Scheduler::tick` on a fixed interval, waking early whenever new work
//! or a free worker shows up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::scheduler::Scheduler;

/// Spawns the dispatch loop. The returned handle is aborted at shutdown.
pub fn spawn_scheduler_task(scheduler: Arc<Scheduler>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(tick_ms = tick.as_millis() as u64, "Starting scheduler loop");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = scheduler.wait_for_work() => {}
            }

            scheduler.reap_stale_workers().await;
            let dispatched = scheduler.tick().await;
            if dispatched > 0 {
                debug!(dispatched, "Scheduler tick dispatched tasks");
            }
        }
    })
}
