//! Liveness/readiness endpoints for Kubernetes probes. Grounded on
//! `operator/src/health.rs`'s `AtomicBool`-backed `HealthStatus`, but served
//! over `axum` routes instead of the teacher's hand-rolled raw-socket HTTP
//! parsing — `mesh-controller` already depends on `axum` for the publish
//! endpoint (§6), so a second bespoke HTTP implementation in the same
//! binary would add nothing.

use axum::{routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Liveness/readiness flags shared between the event loop and the probe
/// server. Readiness only flips true after the first successful build has
/// been published (spec.md §6: "`GET /api/readiness` ... 200 once a first
/// successful build has been published").
#[derive(Clone)]
pub struct HealthStatus {
    ready: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
        if ready {
            info!("control plane is ready");
        } else {
            warn!("control plane is not ready");
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
        if !alive {
            warn!("control plane is not alive");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(status: HealthStatus) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
        .with_state(status)
}

async fn healthz(axum::extract::State(status): axum::extract::State<HealthStatus>) -> axum::http::StatusCode {
    if status.is_alive() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readyz(axum::extract::State(status): axum::extract::State<HealthStatus>) -> axum::http::StatusCode {
    if status.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn livez(axum::extract::State(status): axum::extract::State<HealthStatus>) -> axum::http::StatusCode {
    if status.is_alive() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}
