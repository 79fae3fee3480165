//! Background Tasks Module
//!
//! Long-running loops spawned by the binary. Each returns a `JoinHandle` that is
//! aborted during graceful shutdown.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries and re-applies the size budget
//! - Backup: snapshots the durable tier and rotates old snapshots
//! - Scheduler loop: dispatches pending tasks to idle workers

mod backup;
mod scheduler_loop;
mod sweep;

pub use backup::{spawn_backup_task, BackupFile, BackupRotator};
pub use scheduler_loop::spawn_scheduler_task;
pub use sweep::spawn_sweep_task;
