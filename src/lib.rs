//! Tiered Cache - A two-tier cache with a local task scheduler
//!
//! An in-memory cache with TTL expiration and LRU/LFU/FIFO eviction, written
//! through to a durable store, alongside a priority task scheduler that dispatches
//! work to registered workers with timeouts and bounded retries.

pub mod api;
pub mod cache;
pub mod config;
pub mod durable;
pub mod error;
pub mod events;
pub mod models;
pub mod scheduler;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{EvictionPolicy, TieredCache};
pub use config::Config;
pub use durable::{DurableStore, FileStore, MemoryStore};
pub use error::{Error, Result};
pub use events::{EventBus, ServiceEvent};
pub use scheduler::{HandlerExecutor, Priority, Scheduler, SchedulerConfig, TaskExecutor};
pub use tasks::{spawn_backup_task, spawn_scheduler_task, spawn_sweep_task, BackupRotator};
