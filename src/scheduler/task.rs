//! Task Model
//!
//! Units of work submitted to the scheduler, their priorities and lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// == Priority ==
/// Ordinal priority; higher variants are always dispatched before lower ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// All priorities, highest first.
    pub const DESCENDING: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub(crate) fn band(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

// == Task Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// No further transitions happen from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

// == Task Failure ==
/// Why a single attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

// == Task ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Tag matched against worker capabilities
    pub kind: String,
    /// Opaque input for the executor
    pub payload: Value,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_worker: Option<String>,
    /// Failed attempts so far
    pub attempt: u32,
    pub max_attempts: u32,
    pub timeout_seconds: u64,
    /// Set once `completed`
    pub result: Option<Value>,
    /// Set once permanently `failed`
    pub error: Option<String>,
    /// When the current attempt was dispatched
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// A re-queued task is not dispatched before this instant
    pub retry_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        kind: impl Into<String>,
        payload: Value,
        priority: Priority,
        max_attempts: u32,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            payload,
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            assigned_worker: None,
            attempt: 0,
            max_attempts,
            timeout_seconds,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
            retry_at: None,
        }
    }

    /// Capabilities a worker needs besides `kind`, read from the payload's
    /// optional `requiredCapabilities` string array.
    pub fn required_capabilities(&self) -> Vec<&str> {
        self.payload
            .get("requiredCapabilities")
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether a pending task may be dispatched at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.retry_at.map_or(true, |at| at <= now)
    }
}
