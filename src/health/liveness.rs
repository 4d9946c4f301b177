//! Liveness endpoint.
//!
//! Answers `GET /` with `{"status":"running"}` on its own port. It never
//! consults the pipeline, so it stays up even while the upstream is down.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub fn router() -> Router {
    Router::new().route("/", get(status))
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "running" }))
}

/// Serve the liveness router until shutdown.
pub async fn serve_liveness(
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Liveness endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
