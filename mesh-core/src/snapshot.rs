//! Plain-data input to the Topology Builder.
//!
//! `mesh-core` has no Kubernetes client dependency; `mesh-controller` is
//! responsible for mapping `k8s-openapi`/CRD objects into these shapes at
//! the listers boundary (spec §4.1's "consistent snapshot via listers").
//! Keeping the conversion at that single seam is what lets the builder and
//! provider be tested with plain literals (spec §8 scenarios) without a
//! cluster.

use crate::model::{Protocol, ServicePort};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    pub cluster_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EndpointAddress {
    pub ip: String,
    /// Name/namespace of the pod backing this address, when known.
    pub target_pod: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct EndpointPort {
    pub name: Option<String>,
    pub port: u16,
    pub protocol: Protocol,
}

/// One `subsets[]` entry of a Kubernetes `Endpoints` object. Endpoints are
/// the authoritative source of Pod-to-Service membership (spec §4.1 step 1)
/// because a `ServicePort` may target a pod port by name, and only the
/// subset's own port list carries that name -> number mapping.
#[derive(Debug, Clone)]
pub struct EndpointSubset {
    pub addresses: Vec<EndpointAddress>,
    pub ports: Vec<EndpointPort>,
}

#[derive(Debug, Clone)]
pub struct EndpointsSnapshot {
    /// Same name/namespace as the Service it backs.
    pub name: String,
    pub namespace: String,
    pub subsets: Vec<EndpointSubset>,
}

#[derive(Debug, Clone)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub service_account: String,
    pub ip: Option<String>,
    pub owner_references: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TrafficTargetSource {
    pub service_account: String,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct TrafficTargetDestination {
    pub service_account: String,
    pub namespace: String,
    /// `None` when the TrafficTarget names no destination port.
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub enum TrafficTargetRule {
    Http {
        route_group: String,
        /// Empty means "every match in the route group".
        matches: Vec<String>,
    },
    Tcp {
        route: String,
    },
}

#[derive(Debug, Clone)]
pub struct TrafficTargetSnapshot {
    pub name: String,
    pub namespace: String,
    pub sources: Vec<TrafficTargetSource>,
    pub destination: TrafficTargetDestination,
    pub rules: Vec<TrafficTargetRule>,
}

#[derive(Debug, Clone)]
pub struct HttpRouteGroupSnapshot {
    pub name: String,
    pub namespace: String,
    pub matches: Vec<crate::model::HttpMatch>,
}

#[derive(Debug, Clone)]
pub struct TcpRouteSnapshot {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct TrafficSplitBackendSnapshot {
    pub service: String,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct TrafficSplitSnapshot {
    pub name: String,
    pub namespace: String,
    pub root_service: String,
    pub backends: Vec<TrafficSplitBackendSnapshot>,
    /// SMI leaves TCP/UDP split rule-matching undefined; these are parsed
    /// (so a malformed reference still surfaces) but only consulted for
    /// HTTP splits (spec §9 Open Question 3).
    pub rules: Option<Vec<TrafficTargetRule>>,
}

/// Everything the Topology Builder needs, already fetched from the
/// listers. Building this from a live cluster is `mesh-controller`'s job.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub services: Vec<ServiceSnapshot>,
    pub endpoints: Vec<EndpointsSnapshot>,
    pub pods: Vec<PodSnapshot>,
    pub traffic_targets: Vec<TrafficTargetSnapshot>,
    pub http_route_groups: Vec<HttpRouteGroupSnapshot>,
    pub tcp_routes: Vec<TcpRouteSnapshot>,
    pub traffic_splits: Vec<TrafficSplitSnapshot>,
}
