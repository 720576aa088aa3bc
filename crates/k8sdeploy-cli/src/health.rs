//! Health endpoints (`GET /health`, `GET /probe`).

use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use k8sdeploy_core::app::shutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

async fn ok() -> StatusCode {
    StatusCode::OK
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(ok))
        .route("/probe", get(ok))
}

/// Serve on `listener` until shutdown is requested.
pub async fn serve(
    listener: TcpListener,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!(address = ?listener.local_addr().ok(), "health server listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown::requested(&mut shutdown_rx).await })
        .await
}

pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}
