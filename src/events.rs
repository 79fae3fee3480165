//! Event Stream
//!
//! Broadcast channel carrying cache and scheduler lifecycle events to observers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::EvictionPolicy;
use crate::scheduler::Priority;

// == Service Event ==
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServiceEvent {
    TaskSubmitted {
        task_id: Uuid,
        kind: String,
        priority: Priority,
    },
    TaskDispatched {
        task_id: Uuid,
        worker_id: String,
        attempt: u32,
    },
    TaskRetrying {
        task_id: Uuid,
        attempt: u32,
        error: String,
        delay_ms: u64,
    },
    TaskCompleted {
        task_id: Uuid,
        worker_id: String,
    },
    TaskFailed {
        task_id: Uuid,
        error: String,
        attempts: u32,
    },
    WorkerRegistered {
        worker_id: String,
        capabilities: Vec<String>,
    },
    EntryEvicted {
        key: String,
        size_bytes: u64,
        policy: EvictionPolicy,
    },
    EntryExpired {
        key: String,
    },
}

/// Event stamped with its publication time.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedEvent {
    #[serde(flatten)]
    pub event: ServiceEvent,
    pub published_at: DateTime<Utc>,
}

// == Event Bus ==
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ServiceEvent) {
        let _ = self.sender.send(PublishedEvent {
            event,
            published_at: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
