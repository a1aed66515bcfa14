//! Identity types shared across the topology and the provider.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a namespaced Kubernetes object by `(name, namespace)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    pub namespace: String,
}

impl Key {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.namespace)
    }
}

/// Identifies a `ServiceTrafficTarget`: one TrafficTarget materialized on one
/// concrete Service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceTrafficTargetKey {
    pub service: Key,
    pub traffic_target: Key,
}

impl ServiceTrafficTargetKey {
    pub fn new(service: Key, traffic_target: Key) -> Self {
        Self {
            service,
            traffic_target,
        }
    }
}

impl fmt::Display for ServiceTrafficTargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.traffic_target)
    }
}
