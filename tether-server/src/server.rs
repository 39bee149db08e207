use crate::{ServerConfig, SignalingService, ws_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service)
}

/// Binds `config.addr` and relays until the process stops.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    serve_on(listener, SignalingService::new(config.ice_servers)).await
}

pub async fn serve_on(listener: TcpListener, service: SignalingService) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Signaling server listening on ws://{}/ws", addr);

    axum::serve(listener, router(service))
        .await
        .context("Signaling server stopped")
}
