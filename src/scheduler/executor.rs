//! Task Executors
//!
//! The boundary to whatever actually performs a task. The scheduler only knows
//! that an attempt eventually succeeds with a JSON result, fails, or times out.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Runs one attempt of a task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, payload: &Value, kind: &str) -> anyhow::Result<Value>;
}

type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;
type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Executor that routes each task to the async handler registered for its kind.
#[derive(Clone, Default)]
pub struct HandlerExecutor {
    handlers: HashMap<String, Handler>,
}

impl HandlerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn with_handler<F, Fut>(mut self, kind: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |payload| Box::pin(handler(payload)));
        self.handlers.insert(kind.into(), handler);
        self
    }

    /// Kinds with a registered handler, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for HandlerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerExecutor")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[async_trait]
impl TaskExecutor for HandlerExecutor {
    async fn execute(&self, payload: &Value, kind: &str) -> anyhow::Result<Value> {
        let handler = self
            .handlers
            .get(kind)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no handler registered for kind '{}'", kind))?;
        handler(payload.clone()).await
    }
}
