//! API Routes
//!
//! Configures the Axum router with every service endpoint.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    available_workers_handler, clear_handler, delete_handler, get_handler, health_handler,
    heartbeat_handler, list_workers_handler, purge_task_handler, register_worker_handler,
    scheduler_stats_handler, set_handler, stats_handler, submit_task_handler,
    task_status_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache`, `DELETE /cache` - Store a value / clear both tiers
/// - `GET /cache/:key`, `DELETE /cache/:key` - Read / delete one key
/// - `GET /cache/stats` - Cache statistics
/// - `POST /tasks` - Submit a task
/// - `GET /tasks/:id`, `DELETE /tasks/:id` - Task status / purge a finished task
/// - `POST /workers`, `GET /workers` - Register / list workers
/// - `GET /workers/available` - Idle workers
/// - `POST /workers/:id/heartbeat` - Worker liveness
/// - `GET /scheduler/stats` - Queue and worker counts
/// - `GET /health` - Health check
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache", put(set_handler).delete(clear_handler))
        .route("/cache/stats", get(stats_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/tasks", post(submit_task_handler))
        .route(
            "/tasks/:id",
            get(task_status_handler).delete(purge_task_handler),
        )
        .route(
            "/workers",
            post(register_worker_handler).get(list_workers_handler),
        )
        .route("/workers/available", get(available_workers_handler))
        .route("/workers/:id/heartbeat", post(heartbeat_handler))
        .route("/scheduler/stats", get(scheduler_stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::{CacheStore, EvictionPolicy, TieredCache};
    use crate::durable::MemoryStore;
    use crate::events::EventBus;
    use crate::scheduler::{HandlerExecutor, Scheduler, SchedulerConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let events = EventBus::default();
        let cache = TieredCache::new(
            CacheStore::new(64, EvictionPolicy::Lru),
            Arc::new(MemoryStore::new()),
            events.clone(),
            None,
        );
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(HandlerExecutor::new()),
            events,
        );
        create_router(AppState::new(Arc::new(cache), Arc::new(scheduler)))
    }

    async fn status_of(app: Router, request: Request<Body>) -> StatusCode {
        app.oneshot(request).await.unwrap().status()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let status = status_of(create_test_app(), empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoints() {
        let app = create_test_app();
        let status = status_of(app.clone(), empty_request("GET", "/cache/stats")).await;
        assert_eq!(status, StatusCode::OK);

        let status = status_of(app, empty_request("GET", "/scheduler/stats")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let request = json_request("PUT", "/cache", r#"{"key":"test","value":"hello"}"#);
        assert_eq!(status_of(create_test_app(), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_value_is_rejected() {
        let value = "x".repeat(100);
        let body = format!(r#"{{"key":"big","value":"{}"}}"#, value);
        let request = json_request("PUT", "/cache", &body);
        assert_eq!(
            status_of(create_test_app(), request).await,
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let status = status_of(create_test_app(), empty_request("GET", "/cache/nonexistent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_task_endpoint() {
        let request = json_request("POST", "/tasks", r#"{"kind":"echo","payload":{"a":1}}"#);
        assert_eq!(
            status_of(create_test_app(), request).await,
            StatusCode::ACCEPTED
        );

        let request = json_request("POST", "/tasks", r#"{"kind":""}"#);
        assert_eq!(
            status_of(create_test_app(), request).await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_task_lookup_with_bad_id() {
        let status = status_of(create_test_app(), empty_request("GET", "/tasks/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_worker() {
        let status = status_of(
            create_test_app(),
            empty_request("POST", "/workers/ghost/heartbeat"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
