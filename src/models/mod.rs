//! Request and Response models for the service API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{RegisterWorkerRequest, SetRequest, SubmitTaskRequest};
pub use responses::{
    DeleteResponse, GetResponse, HealthResponse, MessageResponse, SetResponse, StatsResponse,
    SubmitTaskResponse,
};
