//! Topology Builder (spec §4.1): turns a `Snapshot` + `ResourceFilter` into
//! a `Topology`. Never aborts on malformed user input — faults are
//! recorded as `EntityError`s on the entity they concern (spec §7).

use crate::error::{BuildError, EntityError};
use crate::filter::ResourceFilter;
use crate::key::{Key, ServiceTrafficTargetKey};
use crate::model::{
    HttpMatch, Pod, Service, ServiceTrafficTarget, TargetPort, TrafficDestination, TrafficSource,
    TrafficSpec, TrafficSplit, TrafficSplitBackend, Topology,
};
use crate::snapshot::{
    HttpRouteGroupSnapshot, Snapshot, TcpRouteSnapshot, TrafficTargetRule, TrafficTargetSnapshot,
    TrafficSplitSnapshot,
};
use std::collections::{BTreeMap, BTreeSet};

pub fn build(snapshot: &Snapshot, filter: &ResourceFilter) -> Result<Topology, BuildError> {
    let mut topology = Topology::default();

    load_pods(snapshot, filter, &mut topology);
    load_services(snapshot, filter, &mut topology);

    let route_groups = index_http_route_groups(snapshot, filter);
    let tcp_routes = index_tcp_routes(snapshot, filter);

    for tt in &snapshot.traffic_targets {
        if filter.ignores_namespace(&tt.namespace) {
            continue;
        }
        evaluate_traffic_target(tt, &route_groups, &tcp_routes, &mut topology);
    }

    for split in &snapshot.traffic_splits {
        if filter.ignores_namespace(&split.namespace) {
            continue;
        }
        evaluate_traffic_split(split, &route_groups, &tcp_routes, &mut topology);
    }

    compute_authorized_incoming(&mut topology);

    Ok(topology)
}

fn load_pods(snapshot: &Snapshot, filter: &ResourceFilter, topology: &mut Topology) {
    for p in &snapshot.pods {
        if filter.ignores_namespace(&p.namespace) {
            continue;
        }
        let key = Key::new(p.name.clone(), p.namespace.clone());
        let mut pod = Pod::new(key.clone(), p.service_account.clone());
        pod.ip = p.ip.clone().filter(|ip| !ip.is_empty());
        pod.owner_references = p.owner_references.clone();
        topology.pods.insert(key, pod);
    }
}

/// Endpoints, not the Service selector, decide Service membership (spec
/// §4.1 step 1): a `ServicePort` can target a pod port by name, and only an
/// Endpoints subset's own port list carries that name -> number mapping.
fn load_services(snapshot: &Snapshot, filter: &ResourceFilter, topology: &mut Topology) {
    let mut endpoints_by_service: BTreeMap<Key, &crate::snapshot::EndpointsSnapshot> =
        BTreeMap::new();
    for ep in &snapshot.endpoints {
        if filter.ignores_namespace(&ep.namespace) {
            continue;
        }
        endpoints_by_service.insert(Key::new(ep.name.clone(), ep.namespace.clone()), ep);
    }

    for s in &snapshot.services {
        if filter.ignores_namespace(&s.namespace) || filter.ignores_labels(&s.annotations) {
            continue;
        }
        let key = Key::new(s.name.clone(), s.namespace.clone());
        let mut service = Service::new(key.clone());
        service.selector = s.selector.clone();
        service.annotations = s.annotations.clone();
        service.ports = s.ports.clone();
        service.cluster_ip = s.cluster_ip.clone();

        for sp in &service.ports {
            if let TargetPort::Number(n) = sp.target_port {
                service.resolved_ports.insert(sp.port, n);
            }
        }

        if let Some(ep) = endpoints_by_service.get(&key) {
            let mut pods = BTreeSet::new();
            for subset in &ep.subsets {
                for addr in &subset.addresses {
                    if let Some((pod_name, pod_ns)) = &addr.target_pod {
                        let pod_key = Key::new(pod_name.clone(), pod_ns.clone());
                        if topology.pods.contains_key(&pod_key) {
                            pods.insert(pod_key);
                        }
                    }
                }
                for sp in &service.ports {
                    if let TargetPort::Name(name) = &sp.target_port {
                        if let Some(ep_port) = subset.ports.iter().find(|p| p.name.as_deref() == Some(name.as_str())) {
                            service.resolved_ports.entry(sp.port).or_insert(ep_port.port);
                        }
                    }
                }
            }
            service.pods = pods.into_iter().collect();
        }

        topology.services.insert(key, service);
    }
}

fn index_http_route_groups<'a>(
    snapshot: &'a Snapshot,
    filter: &ResourceFilter,
) -> BTreeMap<Key, &'a HttpRouteGroupSnapshot> {
    snapshot
        .http_route_groups
        .iter()
        .filter(|g| !filter.ignores_namespace(&g.namespace))
        .map(|g| (Key::new(g.name.clone(), g.namespace.clone()), g))
        .collect()
}

fn index_tcp_routes<'a>(
    snapshot: &'a Snapshot,
    filter: &ResourceFilter,
) -> BTreeMap<Key, &'a TcpRouteSnapshot> {
    snapshot
        .tcp_routes
        .iter()
        .filter(|r| !filter.ignores_namespace(&r.namespace))
        .map(|r| (Key::new(r.name.clone(), r.namespace.clone()), r))
        .collect()
}

/// Resolve a TrafficTarget's `rules` into `TrafficSpec`s within the
/// traffic target's own namespace. Returns `None` if any named HTTP match
/// could not be resolved — the whole STT is rejected in that case (spec
/// §4.1 step 3).
fn resolve_specs(
    tt_key: &Key,
    namespace: &str,
    rules: &[TrafficTargetRule],
    route_groups: &BTreeMap<Key, &HttpRouteGroupSnapshot>,
    tcp_routes: &BTreeMap<Key, &TcpRouteSnapshot>,
    errors: &mut Vec<EntityError>,
) -> Option<Vec<TrafficSpec>> {
    let mut specs = Vec::new();
    for rule in rules {
        match rule {
            TrafficTargetRule::Http {
                route_group,
                matches,
            } => {
                let rg_key = Key::new(route_group.clone(), namespace.to_string());
                let rg = route_groups.get(&rg_key)?;
                let selected: Vec<HttpMatch> = if matches.is_empty() {
                    rg.matches.clone()
                } else {
                    let mut selected = Vec::with_capacity(matches.len());
                    for name in matches {
                        match rg.matches.iter().find(|m| &m.name == name) {
                            Some(m) => selected.push(m.clone()),
                            None => {
                                errors.push(EntityError::UnknownHttpMatch {
                                    traffic_target: tt_key.clone(),
                                    route_group: rg_key.clone(),
                                    name: name.clone(),
                                });
                                return None;
                            }
                        }
                    }
                    selected
                };
                specs.push(TrafficSpec::Http {
                    route_group: rg_key,
                    matches: selected,
                });
            }
            TrafficTargetRule::Tcp { route } => {
                let route_key = Key::new(route.clone(), namespace.to_string());
                if !tcp_routes.contains_key(&route_key) {
                    return None;
                }
                specs.push(TrafficSpec::Tcp { route: route_key });
            }
        }
    }
    Some(specs)
}

fn evaluate_traffic_target(
    tt: &TrafficTargetSnapshot,
    route_groups: &BTreeMap<Key, &HttpRouteGroupSnapshot>,
    tcp_routes: &BTreeMap<Key, &TcpRouteSnapshot>,
    topology: &mut Topology,
) {
    let tt_key = Key::new(tt.name.clone(), tt.namespace.clone());

    let dest_account = &tt.destination.service_account;
    let dest_namespace = &tt.destination.namespace;

    let matching_services: Vec<Key> = topology
        .services
        .values()
        .filter(|svc| {
            svc.pods.iter().any(|pod_key| {
                topology
                    .pods
                    .get(pod_key)
                    .map(|p| &p.service_account == dest_account && &p.key.namespace == dest_namespace)
                    .unwrap_or(false)
            })
        })
        .map(|svc| svc.key.clone())
        .collect();

    if matching_services.is_empty() {
        topology.record_error(EntityError::UnknownServiceAccount {
            traffic_target: tt_key,
            service_account: dest_account.clone(),
            namespace: dest_namespace.clone(),
        });
        return;
    }

    for service_key in matching_services {
        let service = topology.services.get(&service_key).unwrap();

        let destination_ports = match tt.destination.port {
            None => service.ports.clone(),
            Some(port) => match service
                .ports
                .iter()
                .find(|p| p.target_port == TargetPort::Number(port))
            {
                Some(p) => vec![p.clone()],
                None => {
                    topology.record_error(EntityError::PortMismatch {
                        traffic_target: tt_key.clone(),
                        service: service_key.clone(),
                        port,
                    });
                    continue;
                }
            },
        };

        let destination_pods: Vec<Key> = service
            .pods
            .iter()
            .filter(|pod_key| {
                topology
                    .pods
                    .get(*pod_key)
                    .map(|p| &p.service_account == dest_account && &p.key.namespace == dest_namespace)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if destination_pods.is_empty() {
            topology.record_error(EntityError::MissingDestinationPods {
                service: service_key.clone(),
                traffic_target: tt_key.clone(),
            });
            continue;
        }

        let sources: Vec<TrafficSource> = tt
            .sources
            .iter()
            .map(|src| {
                let pods: Vec<Key> = topology
                    .pods
                    .values()
                    .filter(|p| {
                        p.service_account == src.service_account
                            && p.key.namespace == src.namespace
                            && p.ip.is_some()
                    })
                    .map(|p| p.key.clone())
                    .collect();
                TrafficSource {
                    service_account: src.service_account.clone(),
                    namespace: src.namespace.clone(),
                    pods,
                }
            })
            .collect();

        let mut spec_errors = Vec::new();
        let specs = match resolve_specs(
            &tt_key,
            &tt.namespace,
            &tt.rules,
            route_groups,
            tcp_routes,
            &mut spec_errors,
        ) {
            Some(specs) => specs,
            None => {
                for err in spec_errors {
                    topology.record_error(err);
                }
                continue;
            }
        };

        let stt_key = ServiceTrafficTargetKey::new(service_key.clone(), tt_key.clone());
        let stt = ServiceTrafficTarget {
            key: stt_key.clone(),
            sources,
            destination: TrafficDestination {
                service_account: dest_account.clone(),
                namespace: dest_namespace.clone(),
                ports: destination_ports,
                pods: destination_pods.clone(),
            },
            specs,
            errors: Vec::new(),
        };

        for src in &stt.sources {
            for pod_key in &src.pods {
                if let Some(pod) = topology.pods.get_mut(pod_key) {
                    pod.source_of.insert(stt_key.clone());
                }
            }
        }
        for pod_key in &destination_pods {
            if let Some(pod) = topology.pods.get_mut(pod_key) {
                pod.destination_of.insert(stt_key.clone());
            }
        }
        if let Some(svc) = topology.services.get_mut(&service_key) {
            svc.traffic_targets.insert(stt_key.clone());
        }

        topology.service_traffic_targets.insert(stt_key, stt);
    }
}

fn evaluate_traffic_split(
    split: &TrafficSplitSnapshot,
    route_groups: &BTreeMap<Key, &HttpRouteGroupSnapshot>,
    tcp_routes: &BTreeMap<Key, &TcpRouteSnapshot>,
    topology: &mut Topology,
) {
    let split_key = Key::new(split.name.clone(), split.namespace.clone());
    let root_key = Key::new(split.root_service.clone(), split.namespace.clone());

    let Some(root) = topology.services.get(&root_key) else {
        tracing::warn!(split = %split_key, root = %root_key, "traffic split root service not found");
        return;
    };
    let root_ports: BTreeSet<u16> = root.ports.iter().map(|p| p.port).collect();

    let mut backends = Vec::with_capacity(split.backends.len());
    for b in &split.backends {
        let backend_key = Key::new(b.service.clone(), split.namespace.clone());
        let Some(backend_service) = topology.services.get(&backend_key) else {
            tracing::warn!(split = %split_key, backend = %backend_key, "traffic split backend service not found");
            return;
        };
        let backend_ports: BTreeSet<u16> = backend_service.ports.iter().map(|p| p.port).collect();
        if let Some(missing) = root_ports.difference(&backend_ports).next() {
            topology.record_error(EntityError::BackendPortMissing {
                split: split_key.clone(),
                backend: backend_key,
                root: root_key.clone(),
                port: *missing,
            });
            return;
        }
        backends.push(TrafficSplitBackend {
            service: backend_key,
            weight: b.weight,
        });
    }

    let mut rule_errors = Vec::new();
    let rules = split.rules.as_ref().and_then(|rules| {
        resolve_specs(
            &split_key,
            &split.namespace,
            rules,
            route_groups,
            tcp_routes,
            &mut rule_errors,
        )
    });
    for err in rule_errors {
        topology.record_error(err);
    }

    let traffic_split = TrafficSplit {
        key: split_key.clone(),
        service: root_key.clone(),
        backends: backends.clone(),
        incoming: BTreeSet::new(),
        rules,
        errors: Vec::new(),
    };

    for backend in &backends {
        if let Some(svc) = topology.services.get_mut(&backend.service) {
            svc.backend_of.insert(split_key.clone());
        }
    }
    if let Some(svc) = topology.services.get_mut(&root_key) {
        svc.traffic_splits.insert(split_key.clone());
    }

    topology.traffic_splits.insert(split_key, traffic_split);
}

/// Spec §4.1 step 5: compute each split's authorized-incoming Pod set and
/// detach any split that participates in a cycle. Each split's DFS uses its
/// own fresh `visited` path (copied on branch, not shared) so a cycle
/// discovered from one split's root doesn't spuriously poison a sibling
/// split that isn't actually on the cycle.
fn compute_authorized_incoming(topology: &mut Topology) {
    let split_keys: Vec<Key> = topology.traffic_splits.keys().cloned().collect();
    let mut detached = Vec::new();

    for split_key in split_keys {
        let root = topology.traffic_splits[&split_key].service.clone();
        let mut visited = BTreeSet::new();
        visited.insert(root.clone());
        match split_incoming(&split_key, topology, &visited) {
            Ok(incoming) => {
                topology.traffic_splits.get_mut(&split_key).unwrap().incoming = incoming;
            }
            Err(()) => {
                topology.record_error(EntityError::CircularTrafficSplit {
                    split: split_key.clone(),
                });
                detached.push((root, split_key));
            }
        }
    }

    for (root, split_key) in detached {
        if let Some(svc) = topology.services.get_mut(&root) {
            svc.traffic_splits.remove(&split_key);
        }
    }
}

fn split_incoming(
    split_key: &Key,
    topology: &Topology,
    visited: &BTreeSet<Key>,
) -> Result<BTreeSet<Key>, ()> {
    let split = &topology.traffic_splits[split_key];
    if split.backends.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mut intersection: Option<BTreeSet<Key>> = None;
    for backend in &split.backends {
        let authorized = authorized_incoming(&backend.service, topology, visited)?;
        intersection = Some(match intersection {
            None => authorized,
            Some(cur) => cur.intersection(&authorized).cloned().collect(),
        });
        if intersection.as_ref().is_some_and(|s| s.is_empty()) {
            break;
        }
    }
    Ok(intersection.unwrap_or_default())
}

fn authorized_incoming(
    service_key: &Key,
    topology: &Topology,
    visited: &BTreeSet<Key>,
) -> Result<BTreeSet<Key>, ()> {
    if visited.contains(service_key) {
        return Err(());
    }
    let mut visited = visited.clone();
    visited.insert(service_key.clone());

    let Some(service) = topology.services.get(service_key) else {
        return Ok(BTreeSet::new());
    };

    if !service.traffic_splits.is_empty() {
        let mut union = BTreeSet::new();
        for split_key in &service.traffic_splits {
            union.extend(split_incoming(split_key, topology, &visited)?);
        }
        return Ok(union);
    }

    let mut union = BTreeSet::new();
    for stt_key in &service.traffic_targets {
        if let Some(stt) = topology.service_traffic_targets.get(stt_key) {
            for src in &stt.sources {
                union.extend(src.pods.iter().cloned());
            }
        }
    }
    Ok(union)
}
