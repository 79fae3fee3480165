//! API Handlers
//!
//! HTTP request handlers for the cache, task and worker endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::cache::TieredCache;
use crate::error::{Error, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, MessageResponse, RegisterWorkerRequest,
    SetRequest, SetResponse, StatsResponse, SubmitTaskRequest, SubmitTaskResponse,
};
use crate::scheduler::{Scheduler, SchedulerStats, Task, Worker};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TieredCache>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(cache: Arc<TieredCache>, scheduler: Arc<Scheduler>) -> Self {
        Self { cache, scheduler }
    }
}

// == Cache ==

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(Error::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, req.value, req.ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key)
        .await
        .ok_or_else(|| Error::NotFound(format!("key '{}'", key)))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
///
/// Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key).await;
    Json(DeleteResponse::new(key))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<DeleteResponse> {
    state.cache.clear().await;
    Json(DeleteResponse::cleared())
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    let policy = state.cache.policy().await;
    Json(StatsResponse::new(stats, policy))
}

// == Tasks ==

/// Handler for POST /tasks
pub async fn submit_task_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>)> {
    let task_id = state
        .scheduler
        .submit(
            &req.kind,
            req.payload,
            req.priority.unwrap_or_default(),
            req.max_attempts,
            req.timeout_seconds,
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitTaskResponse { task_id })))
}

/// Handler for GET /tasks/:id
pub async fn task_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<Task>> {
    state
        .scheduler
        .status(task_id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
}

/// Handler for DELETE /tasks/:id
///
/// Only finished tasks can be purged.
pub async fn purge_task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    if state.scheduler.purge_task(task_id).await {
        return Ok(Json(MessageResponse::new(format!("Task {} purged", task_id))));
    }

    match state.scheduler.status(task_id).await {
        Some(task) => Err(Error::InvalidRequest(format!(
            "task {} is still {}",
            task_id, task.status
        ))),
        None => Err(Error::NotFound(format!("task {}", task_id))),
    }
}

// == Workers ==

/// Handler for POST /workers
pub async fn register_worker_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Result<(StatusCode, Json<Worker>)> {
    if let Some(error_msg) = req.validate() {
        return Err(Error::InvalidRequest(error_msg));
    }

    state
        .scheduler
        .register_worker(&req.id, req.capabilities)
        .await?;
    let worker = state
        .scheduler
        .worker(&req.id)
        .await
        .ok_or_else(|| Error::Internal(format!("worker {} vanished after registration", req.id)))?;

    Ok((StatusCode::CREATED, Json(worker)))
}

/// Handler for GET /workers
pub async fn list_workers_handler(State(state): State<AppState>) -> Json<Vec<Worker>> {
    Json(state.scheduler.all_workers().await)
}

/// Handler for GET /workers/available
pub async fn available_workers_handler(State(state): State<AppState>) -> Json<Vec<Worker>> {
    Json(state.scheduler.available_workers().await)
}

/// Handler for POST /workers/:id/heartbeat
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.scheduler.heartbeat(&worker_id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Heartbeat recorded for {}",
        worker_id
    ))))
}

// == Scheduler / Health ==

/// Handler for GET /scheduler/stats
pub async fn scheduler_stats_handler(State(state): State<AppState>) -> Json<SchedulerStats> {
    Json(state.scheduler.stats().await)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
