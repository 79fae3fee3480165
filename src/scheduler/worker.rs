//! Worker Registry
//!
//! Tracks local execution units, the task kinds they accept, and their status and
//! performance. Status changes are driven by the scheduler only.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;
use crate::error::{Error, Result};

/// Weight of the newest sample in the rolling latency average.
const LATENCY_SMOOTHING: f64 = 0.2;

// == Worker Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
}

// == Worker Performance ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPerformance {
    /// Exponentially smoothed attempt latency
    pub avg_latency_ms: f64,
    /// Successful attempts over all finished attempts
    pub success_rate: f64,
    /// 1.0 while running a task, 0.0 otherwise
    pub current_load: f64,
}

impl Default for WorkerPerformance {
    fn default() -> Self {
        Self {
            avg_latency_ms: 0.0,
            success_rate: 1.0,
            current_load: 0.0,
        }
    }
}

// == Worker ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub capabilities: BTreeSet<String>,
    pub status: WorkerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    /// Tasks completed successfully
    pub tasks_processed: u64,
    /// Attempts that failed or timed out
    pub tasks_failed: u64,
    /// Set exactly while `status` is `Busy`
    pub current_task: Option<Uuid>,
    pub performance: WorkerPerformance,
}

impl Worker {
    pub fn new<I, S>(id: impl Into<String>, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            status: WorkerStatus::Idle,
            last_heartbeat: now,
            registered_at: now,
            tasks_processed: 0,
            tasks_failed: 0,
            current_task: None,
            performance: WorkerPerformance::default(),
        }
    }

    /// Whether this worker may run `task`: it must accept the task's kind and
    /// every capability the payload declares.
    pub fn can_run(&self, task: &Task) -> bool {
        self.capabilities.contains(&task.kind)
            && task
                .required_capabilities()
                .into_iter()
                .all(|cap| self.capabilities.contains(cap))
    }

    fn record_outcome(&mut self, latency: Duration, success: bool) {
        let sample = latency.as_secs_f64() * 1000.0;
        let finished = self.tasks_processed + self.tasks_failed;
        self.performance.avg_latency_ms = if finished == 0 {
            sample
        } else {
            LATENCY_SMOOTHING * sample + (1.0 - LATENCY_SMOOTHING) * self.performance.avg_latency_ms
        };

        if success {
            self.tasks_processed += 1;
        } else {
            self.tasks_failed += 1;
        }
        self.performance.success_rate =
            self.tasks_processed as f64 / (self.tasks_processed + self.tasks_failed) as f64;
    }
}

// == Worker Registry ==
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    /// Ordered by id so dispatch order is deterministic
    workers: BTreeMap<String, Worker>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an idle worker, or refreshes the capabilities of a known one.
    ///
    /// Returns true if the id was new.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty id
    /// - `WorkerBusy` when re-registering a worker that is running a task
    pub fn register(&mut self, id: &str, capabilities: Vec<String>) -> Result<bool> {
        if id.trim().is_empty() {
            return Err(Error::InvalidRequest("Worker id cannot be empty".to_string()));
        }

        match self.workers.get_mut(id) {
            Some(existing) if existing.status == WorkerStatus::Busy => {
                Err(Error::WorkerBusy(id.to_string()))
            }
            Some(existing) => {
                existing.capabilities = capabilities.into_iter().collect();
                existing.status = WorkerStatus::Idle;
                existing.last_heartbeat = Utc::now();
                Ok(false)
            }
            None => {
                self.workers
                    .insert(id.to_string(), Worker::new(id, capabilities));
                Ok(true)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Worker> {
        self.workers.get(id)
    }

    /// Ids of idle workers in id order.
    pub fn idle_ids(&self) -> Vec<String> {
        self.workers
            .values()
            .filter(|w| w.status == WorkerStatus::Idle)
            .map(|w| w.id.clone())
            .collect()
    }

    pub fn available(&self) -> Vec<Worker> {
        self.workers
            .values()
            .filter(|w| w.status == WorkerStatus::Idle)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Worker> {
        self.workers.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn count(&self, status: WorkerStatus) -> usize {
        self.workers.values().filter(|w| w.status == status).count()
    }

    /// Refreshes the heartbeat; an offline worker comes back idle.
    ///
    /// Returns true if the worker was offline.
    pub fn heartbeat(&mut self, id: &str) -> Result<bool> {
        let worker = self.lookup_mut(id)?;
        worker.last_heartbeat = Utc::now();
        if worker.status == WorkerStatus::Offline {
            worker.status = WorkerStatus::Idle;
            return Ok(true);
        }
        Ok(false)
    }

    /// Takes an idle worker out of rotation.
    pub fn mark_offline(&mut self, id: &str) -> Result<()> {
        let worker = self.lookup_mut(id)?;
        if worker.status == WorkerStatus::Busy {
            return Err(Error::WorkerBusy(id.to_string()));
        }
        worker.status = WorkerStatus::Offline;
        worker.performance.current_load = 0.0;
        Ok(())
    }

    /// Idle workers whose last heartbeat is older than `timeout` go offline.
    ///
    /// Busy workers are left alone; their task timeout frees them.
    pub fn reap_stale(&mut self, timeout: Duration, now: DateTime<Utc>) -> Vec<String> {
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return Vec::new();
        };

        let mut reaped = Vec::new();
        for worker in self.workers.values_mut() {
            if worker.status == WorkerStatus::Idle && now - worker.last_heartbeat > timeout {
                worker.status = WorkerStatus::Offline;
                reaped.push(worker.id.clone());
            }
        }
        reaped
    }

    /// Marks an idle worker busy with `task_id`.
    pub(crate) fn assign(&mut self, id: &str, task_id: Uuid) -> Result<()> {
        let worker = self.lookup_mut(id)?;
        if worker.status != WorkerStatus::Idle {
            return Err(Error::WorkerBusy(id.to_string()));
        }
        worker.status = WorkerStatus::Busy;
        worker.current_task = Some(task_id);
        worker.performance.current_load = 1.0;
        Ok(())
    }

    /// Returns a busy worker to idle and records how its attempt went.
    pub(crate) fn release(&mut self, id: &str, latency: Duration, success: bool) -> Result<()> {
        let worker = self.lookup_mut(id)?;
        worker.status = WorkerStatus::Idle;
        worker.current_task = None;
        worker.last_heartbeat = Utc::now();
        worker.performance.current_load = 0.0;
        worker.record_outcome(latency, success);
        Ok(())
    }

    fn lookup_mut(&mut self, id: &str) -> Result<&mut Worker> {
        self.workers
            .get_mut(id)
            .ok_or_else(|| Error::UnknownWorker(id.to_string()))
    }
}
