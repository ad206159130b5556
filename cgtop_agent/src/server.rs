//! HTTP surface: the `/ws` live channel, `/healthz`, optional static assets,
//! and the plain / TLS serve loops with graceful shutdown.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;
use crate::ws::ws_handler;

pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health_handler));
    if let Some(dir) = state.config.static_dir.clone() {
        info!("serving static assets from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snap = state.snapshots.read().await;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "host": state.hostname,
        "clients": state.client_count.load(Ordering::Relaxed),
        "nodes": snap.nodes.len(),
        "tick": snap.tick,
    }))
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Serve plain HTTP/WebSocket on an already bound listener until `shutdown`.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
}

/// Serve HTTPS/WSS with the given PEM material until `shutdown`.
pub async fn serve_tls(
    addr: SocketAddr,
    cert: std::path::PathBuf,
    key: std::path::PathBuf,
    state: AppState,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            wait_for_shutdown(shutdown).await;
            handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });
    }
    let app = build_router(state);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
