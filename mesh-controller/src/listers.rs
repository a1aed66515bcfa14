//! Maps live cluster state into `mesh_core::snapshot::Snapshot` (spec.md
//! §4.1's "consistent snapshot via listers"). This is the one seam where
//! `k8s-openapi`/CRD types meet `mesh-core`'s plain-data input — keeping the
//! conversion here, and nowhere else, is what lets the builder and provider
//! stay unit-testable without a cluster.

use mesh_controller::crd::{HttpRouteGroup, TcpRoute, TrafficSplit, TrafficTarget};
use crate::error::ControllerError;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{
    api::{Api, ListParams},
    Client, ResourceExt,
};
use mesh_core::model::{HttpMatch, Protocol, ServicePort, TargetPort};
use mesh_core::snapshot::{
    EndpointAddress, EndpointPort, EndpointSubset, EndpointsSnapshot, HttpRouteGroupSnapshot,
    PodSnapshot, ServiceSnapshot, Snapshot, TcpRouteSnapshot, TrafficSplitBackendSnapshot,
    TrafficSplitSnapshot, TrafficTargetDestination, TrafficTargetRule, TrafficTargetSnapshot,
    TrafficTargetSource,
};
use std::collections::BTreeMap;

/// Fetch everything the Topology Builder needs from the API server. Errors
/// here are `SnapshotUnavailable` (spec.md §7): the rebuild that triggered
/// this fetch is aborted and retried after backoff, rather than producing a
/// partial `Topology`.
#[tracing::instrument(skip(client))]
pub async fn fetch_snapshot(client: &Client) -> Result<Snapshot, ControllerError> {
    let services: Api<Service> = Api::all(client.clone());
    let endpoints: Api<Endpoints> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());
    let traffic_targets: Api<TrafficTarget> = Api::all(client.clone());
    let http_route_groups: Api<HttpRouteGroup> = Api::all(client.clone());
    let tcp_routes: Api<TcpRoute> = Api::all(client.clone());
    let traffic_splits: Api<TrafficSplit> = Api::all(client.clone());

    let lp = ListParams::default();
    let (services, endpoints, pods, traffic_targets, http_route_groups, tcp_routes, traffic_splits) = tokio::try_join!(
        services.list(&lp),
        endpoints.list(&lp),
        pods.list(&lp),
        traffic_targets.list(&lp),
        http_route_groups.list(&lp),
        tcp_routes.list(&lp),
        traffic_splits.list(&lp),
    )?;

    Ok(Snapshot {
        services: services.items.iter().filter_map(service_snapshot).collect(),
        endpoints: endpoints.items.iter().filter_map(endpoints_snapshot).collect(),
        pods: pods.items.iter().filter_map(pod_snapshot).collect(),
        traffic_targets: traffic_targets.items.iter().filter_map(traffic_target_snapshot).collect(),
        http_route_groups: http_route_groups.items.iter().filter_map(http_route_group_snapshot).collect(),
        tcp_routes: tcp_routes.items.iter().map(tcp_route_snapshot).collect(),
        traffic_splits: traffic_splits.items.iter().filter_map(traffic_split_snapshot).collect(),
    })
}

fn protocol(raw: Option<&String>) -> Protocol {
    match raw.map(|s| s.as_str()) {
        Some("UDP") => Protocol::Udp,
        _ => Protocol::Tcp,
    }
}

fn target_port(raw: Option<&IntOrString>, fallback: i32) -> TargetPort {
    match raw {
        Some(IntOrString::Int(n)) => TargetPort::Number(*n as u16),
        Some(IntOrString::String(s)) => TargetPort::Name(s.clone()),
        None => TargetPort::Number(fallback as u16),
    }
}

fn service_snapshot(svc: &Service) -> Option<ServiceSnapshot> {
    let name = svc.name_any();
    let namespace = svc.namespace()?;
    let spec = svc.spec.as_ref()?;

    let ports = spec
        .ports
        .as_ref()
        .into_iter()
        .flatten()
        .map(|p| ServicePort {
            name: p.name.clone(),
            port: p.port as u16,
            target_port: target_port(p.target_port.as_ref(), p.port),
            protocol: protocol(p.protocol.as_ref()),
        })
        .collect();

    Some(ServiceSnapshot {
        name,
        namespace,
        selector: spec.selector.clone().unwrap_or_default(),
        annotations: svc.metadata.annotations.clone().unwrap_or_default().into_iter().collect(),
        ports,
        cluster_ip: spec.cluster_ip.clone(),
    })
}

fn endpoints_snapshot(ep: &Endpoints) -> Option<EndpointsSnapshot> {
    let name = ep.name_any();
    let namespace = ep.namespace()?;
    let subsets = ep
        .subsets
        .as_ref()
        .into_iter()
        .flatten()
        .map(|s| EndpointSubset {
            addresses: s
                .addresses
                .as_ref()
                .into_iter()
                .flatten()
                .map(|a| EndpointAddress {
                    ip: a.ip.clone(),
                    target_pod: a
                        .target_ref
                        .as_ref()
                        .filter(|r| r.kind.as_deref() == Some("Pod"))
                        .and_then(|r| Some((r.name.clone()?, r.namespace.clone()?))),
                })
                .collect(),
            ports: s
                .ports
                .as_ref()
                .into_iter()
                .flatten()
                .map(|p| EndpointPort {
                    name: p.name.clone(),
                    port: p.port as u16,
                    protocol: protocol(p.protocol.as_ref()),
                })
                .collect(),
        })
        .collect();

    Some(EndpointsSnapshot { name, namespace, subsets })
}

fn pod_snapshot(pod: &Pod) -> Option<PodSnapshot> {
    let name = pod.name_any();
    let namespace = pod.namespace()?;
    let service_account = pod
        .spec
        .as_ref()
        .and_then(|s| s.service_account_name.clone())
        .unwrap_or_else(|| "default".to_string());
    let ip = pod.status.as_ref().and_then(|s| s.pod_ip.clone());
    let owner_references = pod
        .metadata
        .owner_references
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|o| o.uid)
        .collect();

    Some(PodSnapshot {
        name,
        namespace,
        service_account,
        ip,
        owner_references,
    })
}

fn traffic_target_rules(rules: &[mesh_controller::crd::TrafficTargetRule]) -> Vec<TrafficTargetRule> {
    rules
        .iter()
        .map(|r| match r.kind.as_str() {
            "TCPRoute" => TrafficTargetRule::Tcp { route: r.name.clone() },
            _ => TrafficTargetRule::Http {
                route_group: r.name.clone(),
                matches: r.matches.clone(),
            },
        })
        .collect()
}

fn traffic_target_snapshot(tt: &TrafficTarget) -> Option<TrafficTargetSnapshot> {
    let name = tt.name_any();
    let namespace = tt.namespace()?;
    let dest = &tt.spec.destination;

    Some(TrafficTargetSnapshot {
        name,
        namespace: namespace.clone(),
        sources: tt
            .spec
            .sources
            .iter()
            .map(|s| TrafficTargetSource {
                service_account: s.name.clone(),
                namespace: s.namespace.clone().unwrap_or_else(|| namespace.clone()),
            })
            .collect(),
        destination: TrafficTargetDestination {
            service_account: dest.name.clone(),
            namespace: dest.namespace.clone().unwrap_or(namespace),
            port: dest.port,
        },
        rules: traffic_target_rules(&tt.spec.rules),
    })
}

fn http_route_group_snapshot(rg: &HttpRouteGroup) -> Option<HttpRouteGroupSnapshot> {
    Some(HttpRouteGroupSnapshot {
        name: rg.name_any(),
        namespace: rg.namespace()?,
        matches: rg
            .spec
            .matches
            .iter()
            .map(|m| HttpMatch {
                name: m.name.clone(),
                path_regex: m.path_regex.clone(),
                methods: m.methods.clone(),
                headers: m.headers.clone(),
            })
            .collect(),
    })
}

fn tcp_route_snapshot(r: &TcpRoute) -> TcpRouteSnapshot {
    TcpRouteSnapshot {
        name: r.name_any(),
        namespace: r.namespace().unwrap_or_default(),
    }
}

fn traffic_split_snapshot(ts: &TrafficSplit) -> Option<TrafficSplitSnapshot> {
    let namespace = ts.namespace()?;
    Some(TrafficSplitSnapshot {
        name: ts.name_any(),
        namespace,
        root_service: ts.spec.service.clone(),
        backends: ts
            .spec
            .backends
            .iter()
            .map(|b| TrafficSplitBackendSnapshot {
                service: b.service.clone(),
                weight: b.weight,
            })
            .collect(),
        rules: ts
            .spec
            .matches
            .as_ref()
            .map(|matches| {
                matches
                    .iter()
                    .map(|m| TrafficTargetRule::Http {
                        route_group: m.name.clone(),
                        matches: Vec::new(),
                    })
                    .collect()
            }),
    })
}
