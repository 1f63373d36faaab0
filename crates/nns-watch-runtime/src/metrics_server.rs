//! Operational HTTP endpoint.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /metrics` | Prometheus text exposition |
//! | `GET /health` | JSON status with subscriber count and watermark |

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use nns_watch_core::WatchState;
use nns_watch_core::ShutdownSignal;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub fn router(state: Arc<WatchState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serve the router on `listener` until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<WatchState>,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Metrics endpoint listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}

async fn metrics_handler() -> impl IntoResponse {
    match nns_watch_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Couldn't encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_check(State(state): State<Arc<WatchState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "nns-watch",
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.registry().len(),
        "last_seen_proposal": state.watermark().current(),
    }))
}
