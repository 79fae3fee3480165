//! Scheduler Engine
//!
//! Owns the task queue, the in-flight and finished task tables and the worker
//! registry behind one mutex. A tick pops work and marks workers busy under that
//! lock, so concurrent ticks can never hand one worker two tasks or one task two
//! workers. Execution runs on spawned tasks and reports back exactly once,
//! either with the executor's outcome or with a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::executor::TaskExecutor;
use super::queue::TaskQueue;
use super::task::{Priority, Task, TaskFailure, TaskStatus};
use super::worker::{Worker, WorkerRegistry, WorkerStatus};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventBus, ServiceEvent};

// == Scheduler Config ==
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub default_max_attempts: u32,
    pub default_timeout_seconds: u64,
    pub retry_backoff_base_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub worker_heartbeat_timeout: Option<Duration>,
}

impl SchedulerConfig {
    /// Delay before a task that has failed `attempt` times may run again.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if self.retry_backoff_base_ms == 0 || attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 1).min(32);
        let delay_ms = self
            .retry_backoff_base_ms
            .saturating_mul(factor)
            .min(self.retry_backoff_max_ms);
        Duration::from_millis(delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_attempts: 3,
            default_timeout_seconds: 300,
            retry_backoff_base_ms: 1000,
            retry_backoff_max_ms: 60_000,
            worker_heartbeat_timeout: None,
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_max_attempts: config.default_max_attempts,
            default_timeout_seconds: config.default_task_timeout_seconds,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
            retry_backoff_max_ms: config.retry_backoff_max_ms,
            worker_heartbeat_timeout: config
                .worker_heartbeat_timeout_seconds
                .map(Duration::from_secs),
        }
    }
}

// == Scheduler Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub workers_idle: usize,
    pub workers_busy: usize,
    pub workers_offline: usize,
}

#[derive(Debug, Default)]
struct SchedulerState {
    queue: TaskQueue,
    in_flight: HashMap<Uuid, Task>,
    /// Terminal tasks kept for status queries until purged
    finished: HashMap<Uuid, Task>,
    workers: WorkerRegistry,
}

// == Scheduler ==
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    executor: Arc<dyn TaskExecutor>,
    events: EventBus,
    config: SchedulerConfig,
    wake: Notify,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, executor: Arc<dyn TaskExecutor>, events: EventBus) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            executor,
            events,
            config,
            wake: Notify::new(),
        }
    }

    // == Submit ==
    /// Queues a new task and returns its id.
    ///
    /// Execution problems never surface here; they end up in the task's `error`
    /// once its attempts are exhausted.
    ///
    /// # Errors
    /// - `InvalidRequest` for an empty kind or a zero attempt/timeout limit
    pub async fn submit(
        &self,
        kind: &str,
        payload: Value,
        priority: Priority,
        max_attempts: Option<u32>,
        timeout_seconds: Option<u64>,
    ) -> Result<Uuid> {
        if kind.trim().is_empty() {
            return Err(Error::InvalidRequest("Task kind cannot be empty".to_string()));
        }
        let max_attempts = max_attempts.unwrap_or(self.config.default_max_attempts);
        if max_attempts == 0 {
            return Err(Error::InvalidRequest(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        let timeout_seconds = timeout_seconds.unwrap_or(self.config.default_timeout_seconds);
        if timeout_seconds == 0 {
            return Err(Error::InvalidRequest(
                "timeout_seconds must be at least 1".to_string(),
            ));
        }

        let task = Task::new(kind, payload, priority, max_attempts, timeout_seconds);
        let task_id = task.id;

        {
            let mut state = self.state.lock().await;
            state.queue.push_back(task);
            self.events.publish(ServiceEvent::TaskSubmitted {
                task_id,
                kind: kind.to_string(),
                priority,
            });
        }

        info!(%task_id, kind, %priority, "Task submitted");
        self.wake.notify_one();

        Ok(task_id)
    }

    // == Status ==
    /// Snapshot of a task wherever it currently lives.
    pub async fn status(&self, task_id: Uuid) -> Option<Task> {
        let state = self.state.lock().await;
        state
            .queue
            .get(&task_id)
            .or_else(|| state.in_flight.get(&task_id))
            .or_else(|| state.finished.get(&task_id))
            .cloned()
    }

    /// Drops the record of a terminal task. Returns false for unknown or live tasks.
    pub async fn purge_task(&self, task_id: Uuid) -> bool {
        self.state.lock().await.finished.remove(&task_id).is_some()
    }

    /// Drops every terminal task record, returning how many were removed.
    pub async fn purge_finished(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.finished.len();
        state.finished.clear();
        count
    }

    // == Workers ==
    /// Registers an idle worker accepting the given task kinds.
    pub async fn register_worker(&self, worker_id: &str, capabilities: Vec<String>) -> Result<()> {
        let is_new = self
            .state
            .lock()
            .await
            .workers
            .register(worker_id, capabilities.clone())?;

        info!(worker_id, ?capabilities, is_new, "Worker registered");
        self.events.publish(ServiceEvent::WorkerRegistered {
            worker_id: worker_id.to_string(),
            capabilities,
        });
        self.wake.notify_one();
        Ok(())
    }

    /// Records a heartbeat; an offline worker comes back into rotation.
    pub async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        let revived = self.state.lock().await.workers.heartbeat(worker_id)?;
        if revived {
            info!(worker_id, "Worker back online");
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Takes an idle worker out of rotation.
    pub async fn mark_worker_offline(&self, worker_id: &str) -> Result<()> {
        self.state.lock().await.workers.mark_offline(worker_id)?;
        info!(worker_id, "Worker marked offline");
        Ok(())
    }

    /// Marks idle workers with a stale heartbeat offline, when a timeout is configured.
    pub async fn reap_stale_workers(&self) -> Vec<String> {
        let Some(timeout) = self.config.worker_heartbeat_timeout else {
            return Vec::new();
        };
        let reaped = self
            .state
            .lock()
            .await
            .workers
            .reap_stale(timeout, Utc::now());
        for worker_id in &reaped {
            warn!(%worker_id, "Worker heartbeat timed out, marked offline");
        }
        reaped
    }

    /// Idle workers.
    pub async fn available_workers(&self) -> Vec<Worker> {
        self.state.lock().await.workers.available()
    }

    pub async fn all_workers(&self) -> Vec<Worker> {
        self.state.lock().await.workers.all()
    }

    pub async fn worker(&self, worker_id: &str) -> Option<Worker> {
        self.state.lock().await.workers.get(worker_id).cloned()
    }

    // == Tick ==
    /// Matches every idle worker with the highest-priority ready task it can run
    /// and dispatches the pairs. Returns the number of tasks dispatched.
    pub async fn tick(self: &Arc<Self>) -> usize {
        let now = Utc::now();
        let dispatched = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let mut dispatched = Vec::new();

            for worker_id in state.workers.idle_ids() {
                let Some(worker) = state.workers.get(&worker_id) else {
                    continue;
                };
                let Some(mut task) = state
                    .queue
                    .take_first(|task| task.is_ready(now) && worker.can_run(task))
                else {
                    continue;
                };

                if let Err(e) = state.workers.assign(&worker_id, task.id) {
                    warn!(task_id = %task.id, %worker_id, error = %e, "Assignment failed, task left queued");
                    state.queue.push_front(task);
                    continue;
                }

                task.status = TaskStatus::Processing;
                task.assigned_worker = Some(worker_id.clone());
                task.started_at = Some(now);
                task.retry_at = None;
                state.in_flight.insert(task.id, task.clone());
                dispatched.push(task);
            }

            dispatched
        };

        let count = dispatched.len();
        for task in dispatched {
            let worker_id = task.assigned_worker.clone().unwrap_or_default();
            info!(task_id = %task.id, %worker_id, attempt = task.attempt + 1, "Task dispatched");
            self.events.publish(ServiceEvent::TaskDispatched {
                task_id: task.id,
                worker_id,
                attempt: task.attempt + 1,
            });
            self.dispatch(task);
        }
        count
    }

    fn dispatch(self: &Arc<Self>, task: Task) {
        let scheduler = Arc::clone(self);
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let started = Instant::now();
            let limit = Duration::from_secs(task.timeout_seconds);
            let payload = task.payload.clone();
            let kind = task.kind.clone();

            // Run on its own task so a panicking executor still reports back
            let mut execution =
                tokio::spawn(async move { executor.execute(&payload, &kind).await });

            let outcome = match tokio::time::timeout(limit, &mut execution).await {
                Ok(Ok(Ok(result))) => Ok(result),
                Ok(Ok(Err(e))) => Err(TaskFailure::Execution(format!("{:#}", e))),
                Ok(Err(join_error)) => Err(TaskFailure::Execution(format!(
                    "executor aborted: {}",
                    join_error
                ))),
                Err(_) => {
                    execution.abort();
                    Err(TaskFailure::Timeout {
                        seconds: task.timeout_seconds,
                    })
                }
            };

            scheduler.report(task.id, outcome, started.elapsed()).await;
        });
    }

    // == Report ==
    /// Reconciles the outcome of one attempt: completes, re-queues or fails the
    /// task and returns its worker to idle.
    async fn report(
        self: &Arc<Self>,
        task_id: Uuid,
        outcome: std::result::Result<Value, TaskFailure>,
        elapsed: Duration,
    ) {
        let mut retry_delay = None;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let Some(mut task) = state.in_flight.remove(&task_id) else {
                warn!(%task_id, "Outcome reported for a task that is not in flight");
                return;
            };
            let worker_id = task.assigned_worker.clone().unwrap_or_default();
            if let Err(e) = state.workers.release(&worker_id, elapsed, outcome.is_ok()) {
                warn!(%task_id, %worker_id, error = %e, "Could not release worker");
            }

            let now = Utc::now();
            let event = match outcome {
                Ok(result) => {
                    task.status = TaskStatus::Completed;
                    task.result = Some(result);
                    task.finished_at = Some(now);
                    info!(%task_id, %worker_id, elapsed_ms = elapsed.as_millis() as u64, "Task completed");
                    state.finished.insert(task_id, task);
                    ServiceEvent::TaskCompleted { task_id, worker_id }
                }
                Err(failure) => {
                    task.attempt += 1;
                    if task.attempt < task.max_attempts {
                        let delay = self.config.backoff_delay(task.attempt);
                        task.status = TaskStatus::Pending;
                        task.assigned_worker = None;
                        task.started_at = None;
                        task.retry_at = (!delay.is_zero()).then(|| {
                            now + chrono::Duration::from_std(delay)
                                .unwrap_or_else(|_| chrono::Duration::zero())
                        });
                        warn!(
                            %task_id,
                            %worker_id,
                            attempt = task.attempt,
                            max_attempts = task.max_attempts,
                            error = %failure,
                            delay_ms = delay.as_millis() as u64,
                            "Task attempt failed, re-queued"
                        );
                        let attempt = task.attempt;
                        state.queue.push_back(task);
                        retry_delay = Some(delay);
                        ServiceEvent::TaskRetrying {
                            task_id,
                            attempt,
                            error: failure.to_string(),
                            delay_ms: delay.as_millis() as u64,
                        }
                    } else {
                        let error = failure.to_string();
                        task.status = TaskStatus::Failed;
                        task.error = Some(error.clone());
                        task.finished_at = Some(now);
                        warn!(%task_id, %worker_id, attempts = task.attempt, %error, "Task failed permanently");
                        let attempts = task.attempt;
                        state.finished.insert(task_id, task);
                        ServiceEvent::TaskFailed {
                            task_id,
                            error,
                            attempts,
                        }
                    }
                }
            };
            // Published under the lock so events follow the state transitions
            self.events.publish(event);
        }

        self.wake.notify_one();

        if let Some(delay) = retry_delay.filter(|d| !d.is_zero()) {
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.wake.notify_one();
            });
        }
    }

    // == Wake-ups ==
    /// Resolves when a submit, registration or finished attempt has produced
    /// work for the next tick.
    pub async fn wait_for_work(&self) {
        self.wake.notified().await;
    }

    // == Introspection ==
    pub async fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().await;
        let mut stats = SchedulerStats {
            pending: state.queue.len(),
            processing: state.in_flight.len(),
            workers_idle: state.workers.count(WorkerStatus::Idle),
            workers_busy: state.workers.count(WorkerStatus::Busy),
            workers_offline: state.workers.count(WorkerStatus::Offline),
            ..SchedulerStats::default()
        };
        for task in state.finished.values() {
            match task.status {
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                _ => {}
            }
        }
        stats
    }

    /// Checks the one-worker-one-task invariant in both directions.
    ///
    /// Every busy worker holds exactly one processing task assigned to it, and
    /// every processing task is held by exactly one busy worker.
    pub async fn check_invariants(&self) -> std::result::Result<(), String> {
        let state = self.state.lock().await;

        let busy: Vec<&Worker> = state
            .workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Busy)
            .collect();
        if busy.len() != state.in_flight.len() {
            return Err(format!(
                "{} busy workers but {} processing tasks",
                busy.len(),
                state.in_flight.len()
            ));
        }

        for worker in busy {
            let task = worker
                .current_task
                .and_then(|id| state.in_flight.get(&id))
                .ok_or_else(|| format!("busy worker {} holds no processing task", worker.id))?;
            if task.assigned_worker.as_deref() != Some(worker.id.as_str())
                || task.status != TaskStatus::Processing
            {
                return Err(format!(
                    "task {} is not processing on worker {}",
                    task.id, worker.id
                ));
            }
        }

        for task in state.in_flight.values() {
            let holder = task
                .assigned_worker
                .as_deref()
                .and_then(|id| state.workers.get(id));
            match holder {
                Some(worker)
                    if worker.status == WorkerStatus::Busy
                        && worker.current_task == Some(task.id) => {}
                _ => return Err(format!("processing task {} has no busy worker", task.id)),
            }
        }

        if let Some(task) = state.queue.iter().find(|t| t.status != TaskStatus::Pending) {
            return Err(format!("queued task {} is not pending", task.id));
        }

        debug!("Scheduler invariants hold");
        Ok(())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
