//! sqlrelay-server: HTTP front end for bounded database transactions
//!
//! Wires the transaction core to the outside world: a session-correlated
//! RPC endpoint over axum, a sqlx Postgres pool behind the core's pool
//! contract, and the background expiry monitor.

pub mod db;
pub mod http;
pub mod rpc;
pub mod session;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sqlrelay_core::{spawn_monitor, RelayConfig};

pub use http::error::ApiError;
pub use state::AppState;

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),
}

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config().cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin([
                "http://localhost:3000".parse().unwrap(),
                "http://localhost:3030".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
                "http://127.0.0.1:3030".parse().unwrap(),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(http::routes::health::router())
        .merge(http::routes::rpc::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until shutdown.
///
/// Connects the pool, starts the transaction monitor when enabled, and
/// serves with graceful shutdown on Ctrl+C/SIGTERM.
pub async fn serve(config: RelayConfig) -> Result<(), ServeError> {
    let pool = db::create_pool(&config).await?;
    let state = AppState::new(config.clone(), pool);

    if config.enable_transaction_monitor {
        // Runs for the process lifetime; the handle is intentionally dropped
        spawn_monitor(
            state.registry().clone(),
            config.monitor_interval(),
            config.transaction_timeout(),
        );
    } else {
        tracing::info!("transaction monitor disabled by configuration");
    }

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}
