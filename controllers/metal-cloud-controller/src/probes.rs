//! Liveness and readiness probes
//!
//! - `GET /healthz`: 200 while the process is serving
//! - `GET /readyz`: 200 once both watch caches have synced, 503 before

use crate::error::ProviderError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared readiness flag, set once the provider has synced its caches
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Probe routes
pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(readiness)
}

async fn readyz(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
    if readiness.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "caches not synced")
    }
}

/// Serve probes on `addr` until `cancel` fires
pub async fn serve(addr: SocketAddr, readiness: Readiness, cancel: CancellationToken) -> Result<(), ProviderError> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(ProviderError::Probe)?;
    info!("Serving probes on {}", addr);
    axum::serve(listener, router(readiness))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(ProviderError::Probe)
}
