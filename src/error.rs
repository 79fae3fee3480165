//! Error types for the cache and scheduler
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::durable::StoreError;

// == Service Error Enum ==
/// Unified error type for the cache engine, the scheduler and the HTTP surface.
#[derive(Error, Debug)]
pub enum Error {
    /// Key or task not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A single value is larger than the whole cache budget
    #[error("Value for key '{key}' is {size_bytes} bytes, cache budget is {max_size_bytes} bytes")]
    CapacityExceeded {
        key: String,
        size_bytes: u64,
        max_size_bytes: u64,
    },

    /// Worker id is not registered
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    /// Worker is executing a task and cannot change state
    #[error("Worker is busy: {0}")]
    WorkerBusy(String),

    /// Durable tier failure on an operation that cannot fall back to memory
    #[error("Durable store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnknownWorker(_) => StatusCode::NOT_FOUND,
            Error::WorkerBusy(_) => StatusCode::CONFLICT,
            Error::Store(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the service.
pub type Result<T> = std::result::Result<T, Error>;
