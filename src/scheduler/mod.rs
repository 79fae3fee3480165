//! Scheduler Module
//!
//! Priority task queue, local worker registry and the dispatch engine that
//! matches the two, with timeouts and bounded retries.

mod engine;
mod executor;
mod queue;
mod task;
mod worker;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{Scheduler, SchedulerConfig, SchedulerStats};
pub use executor::{HandlerExecutor, TaskExecutor};
pub use queue::TaskQueue;
pub use task::{Priority, Task, TaskFailure, TaskStatus};
pub use worker::{Worker, WorkerPerformance, WorkerRegistry, WorkerStatus};
