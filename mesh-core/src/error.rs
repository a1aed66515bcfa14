//! Error taxonomy for the topology builder, configuration provider, and
//! port allocator (spec §7).

use crate::key::{Key, ServiceTrafficTargetKey};
use thiserror::Error;

/// A fault tied to one entity. Recorded on the entity it concerns; the
/// entity is then omitted or degraded without aborting the whole build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("service {service}: unknown traffic-type annotation {value:?}")]
    UnknownTrafficType { service: Key, value: String },

    #[error("service {service}: unknown scheme annotation {value:?}")]
    UnknownScheme { service: Key, value: String },

    #[error("service {service}: invalid annotation {annotation}: {reason}")]
    InvalidAnnotation {
        service: Key,
        annotation: String,
        reason: String,
    },

    #[error("traffic target {traffic_target}: destination port {port} matches no service port on {service}")]
    PortMismatch {
        traffic_target: Key,
        service: Key,
        port: u16,
    },

    #[error("traffic target {traffic_target}: HTTP match {name:?} not found in route group {route_group}")]
    UnknownHttpMatch {
        traffic_target: Key,
        route_group: Key,
        name: String,
    },

    #[error("traffic split {split} participates in a split cycle")]
    CircularTrafficSplit { split: Key },

    #[error("traffic split {split}: backend {backend} is missing port {port} exposed by root {root}")]
    BackendPortMissing {
        split: Key,
        backend: Key,
        root: Key,
        port: u16,
    },

    #[error("traffic target {traffic_target}: no pods for destination service account {service_account:?} in namespace {namespace:?}")]
    UnknownServiceAccount {
        traffic_target: Key,
        service_account: String,
        namespace: String,
    },

    #[error("service {service}: traffic target {traffic_target} resolves to zero destination pods")]
    MissingDestinationPods {
        service: Key,
        traffic_target: Key,
    },
}

impl EntityError {
    /// The key this error should be filed against for log correlation and
    /// for the `STT.errors` / `TrafficSplit.errors` back-pointers.
    pub fn subject(&self) -> &Key {
        match self {
            EntityError::UnknownTrafficType { service, .. } => service,
            EntityError::UnknownScheme { service, .. } => service,
            EntityError::InvalidAnnotation { service, .. } => service,
            EntityError::PortMismatch { traffic_target, .. } => traffic_target,
            EntityError::UnknownHttpMatch { traffic_target, .. } => traffic_target,
            EntityError::CircularTrafficSplit { split } => split,
            EntityError::BackendPortMissing { split, .. } => split,
            EntityError::UnknownServiceAccount { traffic_target, .. } => traffic_target,
            EntityError::MissingDestinationPods { traffic_target, .. } => traffic_target,
        }
    }
}

/// A fault tied to a `ServiceTrafficTarget` that could not be materialized
/// at all (as opposed to an error recorded on an otherwise-attached entity).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service traffic target {key} rejected: {source}")]
pub struct RejectedServiceTrafficTarget {
    pub key: ServiceTrafficTargetKey,
    #[source]
    pub source: EntityError,
}

/// Errors that abort an entire build rather than degrade one entity.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),
}

/// Errors from the Port Allocator (spec §4.3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortAllocError {
    #[error("entrypoint range exhausted for {protocol} (range {low}-{high})")]
    EntrypointExhausted {
        protocol: &'static str,
        low: u16,
        high: u16,
    },
}
