use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use axum::{routing::any, Router};
use eyre::{Context, Result};
use tokio::{net::TcpListener, time::sleep};
use tracing::info;

use crate::{
    config::GatewayConfig,
    connection::ConnectionCell,
    db::{PgConnector, SpanStore},
    router::handlers::{get_clerk, get_span},
};

pub mod handlers;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Routes are registered with `any` so that methods other than GET reach the
/// handlers and get a 404 rather than axum's 405.
pub fn create_router<S: SpanStore>(cell: Arc<ConnectionCell<S>>) -> Router {
    Router::new()
        .route("/bor/span/", any(get_span::<S>))
        .route("/bor/span/*id", any(get_span::<S>))
        .route("/clerk/", any(get_clerk))
        .route("/clerk/*rest", any(get_clerk))
        .with_state(cell)
}

/// Starts the store connection in the background, then binds and serves.
/// Requests that arrive before the first connection wait for it.
pub async fn initialize_router(
    config: &GatewayConfig,
    should_terminate: Arc<AtomicBool>,
) -> Result<()> {
    let connector = PgConnector::new(config.connect_options());
    let cell = ConnectionCell::start(connector, config.reconnect_policy()).await;

    let listener = TcpListener::bind(config.listen_addr.as_str())
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.listen_addr))?;

    serve(listener, cell, should_terminate).await
}

pub async fn serve<S: SpanStore>(
    listener: TcpListener,
    cell: Arc<ConnectionCell<S>>,
    should_terminate: Arc<AtomicBool>,
) -> Result<()> {
    info!("->> LISTENING on {}", listener.local_addr()?);

    axum::serve(listener, create_router(cell).into_make_service())
        .with_graceful_shutdown(shutdown_signal(should_terminate))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal(should_terminate: Arc<AtomicBool>) {
    while !should_terminate.load(Ordering::SeqCst) {
        sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
    info!("Shutdown signal received, shutting down router");
}
