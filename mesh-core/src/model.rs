//! Topology data model (spec §3).
//!
//! Entities live in arenas (`BTreeMap<Key, _>`) on `Topology` and reference
//! each other only by key, never by owning reference — this sidesteps the
//! cyclic-graph problem (Service <-> STT <-> Pod, Service <-> TrafficSplit
//! -> Service) spec.md §9 calls out, without lifetimes or `Weak`.
//! `BTreeMap`/`BTreeSet` (rather than a hasher-keyed map) buy the
//! determinism property (§8 invariant 1) for free: iteration order is
//! already canonical, no separate sort pass needed before serialization.

use crate::error::EntityError;
use crate::key::{Key, ServiceTrafficTargetKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// The `targetPort` of a `ServicePort`: either numeric or a named container
/// port, resolved against Endpoints subset port lists (spec §4.1 step 1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetPort {
    Number(u16),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: Option<String>,
    pub port: u16,
    pub target_port: TargetPort,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pod {
    pub key: Key,
    pub service_account: String,
    /// Empty while the pod is scheduling.
    pub ip: Option<String>,
    pub owner_references: Vec<String>,
    pub source_of: BTreeSet<ServiceTrafficTargetKey>,
    pub destination_of: BTreeSet<ServiceTrafficTargetKey>,
}

impl Pod {
    pub fn new(key: Key, service_account: impl Into<String>) -> Self {
        Self {
            key,
            service_account: service_account.into(),
            ip: None,
            owner_references: Vec::new(),
            source_of: BTreeSet::new(),
            destination_of: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub key: Key,
    pub selector: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    /// Authoritative for entrypoint allocation and split-backend
    /// compatibility; order matters (Port Allocator keys HTTP entrypoints
    /// by ordinal position).
    pub ports: Vec<ServicePort>,
    pub cluster_ip: Option<String>,
    pub pods: Vec<Key>,
    /// `ServicePort.port -> numeric container port`, resolved by walking
    /// Endpoints subset port lists when `target_port` is a name rather than
    /// a number (spec §4.1 step 1).
    pub resolved_ports: BTreeMap<u16, u16>,
    pub traffic_targets: BTreeSet<ServiceTrafficTargetKey>,
    pub traffic_splits: BTreeSet<Key>,
    pub backend_of: BTreeSet<Key>,
}

impl Service {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// The numeric backend port to dial for a given `ServicePort.port`,
    /// falling back to that same number when no Endpoints resolution was
    /// found (e.g. the Service has no ready Endpoints yet).
    pub fn backend_port(&self, service_port: u16) -> u16 {
        self.resolved_ports
            .get(&service_port)
            .copied()
            .unwrap_or(service_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMatch {
    pub name: String,
    pub path_regex: Option<String>,
    pub methods: Vec<String>,
    /// Header name -> value regex.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficSpec {
    Http { route_group: Key, matches: Vec<HttpMatch> },
    Tcp { route: Key },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSource {
    pub service_account: String,
    pub namespace: String,
    pub pods: Vec<Key>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficDestination {
    pub service_account: String,
    pub namespace: String,
    pub ports: Vec<ServicePort>,
    pub pods: Vec<Key>,
}

/// One SMI TrafficTarget materialized on one concrete Service that has pods
/// of the target ServiceAccount (spec §3, §4.1 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTrafficTarget {
    pub key: ServiceTrafficTargetKey,
    pub sources: Vec<TrafficSource>,
    pub destination: TrafficDestination,
    pub specs: Vec<TrafficSpec>,
    pub errors: Vec<EntityError>,
}

impl ServiceTrafficTarget {
    /// All source pod keys, in source-list order. Resolving these to IPs
    /// requires the owning `Topology` (see `provider::source_ips`), since a
    /// `Key` alone doesn't carry the pod's IP.
    pub fn source_pod_keys(&self) -> impl Iterator<Item = &Key> {
        self.sources.iter().flat_map(|s| s.pods.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSplitBackend {
    pub service: Key,
    pub weight: u32,
}

/// SMI TrafficSplit: route a root Service's traffic by weight to backend
/// Services (spec §3, §4.1 step 4-5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSplit {
    pub key: Key,
    pub service: Key,
    pub backends: Vec<TrafficSplitBackend>,
    /// Pods authorized to traverse this split; see
    /// `builder::compute_authorized_incoming`.
    pub incoming: BTreeSet<Key>,
    pub rules: Option<Vec<TrafficSpec>>,
    pub errors: Vec<EntityError>,
}

/// An immutable snapshot of the cluster's mesh-relevant state, rebuilt from
/// scratch on every debounced rebuild (spec §3, §5: "owned exclusively by
/// the event loop; each rebuild produces a new value").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub services: BTreeMap<Key, Service>,
    pub pods: BTreeMap<Key, Pod>,
    pub service_traffic_targets: BTreeMap<ServiceTrafficTargetKey, ServiceTrafficTarget>,
    pub traffic_splits: BTreeMap<Key, TrafficSplit>,
    /// Per-entity faults collected during the build; never fatal on their
    /// own (spec §7 `EntityError` propagation policy).
    pub errors: Vec<EntityError>,
}

impl Topology {
    pub fn record_error(&mut self, err: EntityError) {
        tracing::warn!(error = %err, "topology build recorded entity error");
        self.errors.push(err);
    }
}
