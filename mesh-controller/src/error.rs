//! Controller-level error taxonomy, grounded on
//! `operator/src/controllers/site.rs::SiteError` (thiserror enum with
//! `#[from]` conversions). `mesh_core`'s own error types (`EntityError`,
//! `BuildError`, `PortAllocError`) stay per-entity/per-rebuild faults and
//! are never wrapped here; this enum only covers the ambient concerns
//! `mesh_core` has no opinion on: talking to the API server and publishing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("topology snapshot unavailable: {0}")]
    SnapshotUnavailable(#[from] mesh_core::BuildError),

    #[error("failed to publish dynamic configuration: {0}")]
    PublishFailed(String),

    #[error("shadow service reconciliation failed for {service}: {reason}")]
    ShadowService { service: String, reason: String },

    #[error("port table store error: {0}")]
    PortTableStore(String),
}
