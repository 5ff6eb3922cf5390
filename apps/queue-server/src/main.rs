//! # Pila Queue Server
//!
//! Server binary: wires the database, realtime hub, notification worker,
//! and reset scheduler together behind the axum API.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tracing init → config → database (+ migrations) → hub → notifier      │
//! │       → reset scheduler → axum serve (graceful shutdown on signal)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pila_db::{Database, DbConfig};
use pila_realtime::{HubConfig, QueueHub};

use pila_queue_server::config::ServerConfig;
use pila_queue_server::notify::Notifier;
use pila_queue_server::reset::ResetScheduler;
use pila_queue_server::routes;
use pila_queue_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Pila queue server...");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        port = config.http_port,
        db_path = %config.database_path,
        tz_offset_hours = config.tz_offset_hours,
        reset_hour = config.reset_hour,
        "Configuration loaded"
    );

    // Connect to the database and run migrations
    let db_config = DbConfig::new(&config.database_path).lock_timeout(config.lock_timeout());
    let db = Database::new(db_config).await?;
    info!("Database ready");

    // Realtime hub and notification worker
    let hub = Arc::new(QueueHub::new(db.clone(), HubConfig::default()));
    let notifier = Notifier::spawn();

    // Reset scheduler
    let (scheduler, reset_handle) = ResetScheduler::new(db.clone(), hub.clone(), config.clone());
    tokio::spawn(scheduler.run());

    // Build the router
    let state = AppState::new(db.clone(), hub, notifier, config.clone());
    let app = routes::router(state);

    // Serve
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background work before closing the pool
    reset_handle.shutdown().await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
