//! Tiered Cache server binary
//!
//! Wires configuration, the durable store, the cache, the scheduler and the
//! background loops behind the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::{
    create_router, spawn_backup_task, spawn_scheduler_task, spawn_sweep_task, AppState,
    BackupRotator, Config, EventBus, FileStore, HandlerExecutor, Scheduler, SchedulerConfig,
    TieredCache,
};

/// Main entry point for the Tiered Cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable store and warm the in-memory tier from it
/// 4. Create the scheduler with the built-in task handlers
/// 5. Start the sweep, backup and scheduler loops
/// 6. Serve the HTTP API until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tiered Cache server");

    let config = Config::from_env();
    info!(
        max_size_bytes = config.max_size_bytes,
        eviction_policy = %config.eviction_policy,
        default_ttl_seconds = ?config.default_ttl_seconds,
        data_dir = %config.data_dir.display(),
        port = config.server_port,
        "Configuration loaded"
    );

    let events = EventBus::new(config.event_channel_capacity);

    let durable = FileStore::open(config.cache_dir())
        .await
        .context("failed to open durable store")?;
    let cache = Arc::new(TieredCache::from_config(
        &config,
        Arc::new(durable),
        events.clone(),
    ));
    match cache.warm_from_durable().await {
        Ok(loaded) => info!(loaded, "Cache warmed"),
        Err(e) => warn!(error = %e, "Cache warm-up failed, starting cold"),
    }

    let executor = HandlerExecutor::new().with_handler("echo", |payload: Value| async move {
        Ok::<_, anyhow::Error>(payload)
    });
    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::from(&config),
        Arc::new(executor),
        events,
    ));

    let mut handles = vec![
        spawn_sweep_task(
            Arc::clone(&cache),
            Duration::from_secs(config.sweep_interval_seconds.max(1)),
        ),
        spawn_scheduler_task(
            Arc::clone(&scheduler),
            Duration::from_millis(config.scheduler_tick_ms.max(1)),
        ),
    ];
    match config.backup_interval() {
        Some(interval) => handles.push(spawn_backup_task(
            Arc::clone(&cache),
            BackupRotator::new(config.backup_dir(), config.backup_retention_count),
            interval,
        )),
        None => info!("Backups disabled"),
    }
    info!(count = handles.len(), "Background tasks started");

    let app = create_router(AppState::new(cache, scheduler));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(handles))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the background tasks.
async fn shutdown_signal(handles: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in &handles {
        handle.abort();
    }
    warn!(count = handles.len(), "Background tasks aborted");
}
