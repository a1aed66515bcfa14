//! Publish/readiness HTTP endpoints (spec.md §6 "Outbound"), grounded on
//! `patronus-dashboard/src/api/sites.rs`'s axum handler idiom
//! (`State<Arc<...>>`, `Json<...>` responses).

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use mesh_core::provider::config::DynamicConfig;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The last successfully published `DynamicConfig`, shared between the
/// event loop (writer) and the publish endpoint (reader). `None` until the
/// first rebuild completes.
#[derive(Clone, Default)]
pub struct PublishedConfig(pub Arc<RwLock<Option<DynamicConfig>>>);

impl PublishedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, cfg: DynamicConfig) {
        *self.0.write().await = Some(cfg);
    }

    pub async fn is_published(&self) -> bool {
        self.0.read().await.is_some()
    }
}

pub fn router(state: PublishedConfig) -> Router {
    Router::new()
        .route("/api/configuration/current", get(current_configuration))
        .route("/api/readiness", get(readiness))
        .with_state(state)
}

async fn current_configuration(
    State(state): State<PublishedConfig>,
) -> Result<Json<DynamicConfig>, StatusCode> {
    match state.0.read().await.clone() {
        Some(cfg) => Ok(Json(cfg)),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn readiness(State(state): State<PublishedConfig>) -> StatusCode {
    if state.is_published().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
