//! End-to-end scenarios and testable properties for the Topology Builder
//! and Configuration Provider, built from literal snapshot fixtures.

use mesh_core::builder;
use mesh_core::filter::ResourceFilter;
use mesh_core::key::Key;
use mesh_core::model::{Protocol, ServicePort, TargetPort};
use mesh_core::ports::PortTable;
use mesh_core::provider::config::{HttpRouter, HttpService, IpStrategy, Middleware, TcpUdpService};
use mesh_core::provider::{self, TrafficType};
use mesh_core::snapshot::{
    EndpointAddress, EndpointPort, EndpointSubset, EndpointsSnapshot, HttpRouteGroupSnapshot,
    PodSnapshot, ServiceSnapshot, Snapshot, TrafficSplitBackendSnapshot, TrafficSplitSnapshot,
    TrafficTargetDestination, TrafficTargetRule, TrafficTargetSnapshot, TrafficTargetSource,
};
use std::collections::BTreeMap;

fn numeric_port(port: u16) -> ServicePort {
    ServicePort {
        name: None,
        port,
        target_port: TargetPort::Number(port),
        protocol: Protocol::Tcp,
    }
}

fn svc(name: &str, ns: &str, ports: Vec<ServicePort>) -> ServiceSnapshot {
    ServiceSnapshot {
        name: name.to_string(),
        namespace: ns.to_string(),
        selector: BTreeMap::new(),
        annotations: BTreeMap::new(),
        ports,
        cluster_ip: None,
    }
}

fn pod(name: &str, ns: &str, sa: &str, ip: Option<&str>) -> PodSnapshot {
    PodSnapshot {
        name: name.to_string(),
        namespace: ns.to_string(),
        service_account: sa.to_string(),
        ip: ip.map(|s| s.to_string()),
        owner_references: Vec::new(),
    }
}

fn endpoints_with_pods(svc_name: &str, ns: &str, pods: &[(&str, &str)]) -> EndpointsSnapshot {
    EndpointsSnapshot {
        name: svc_name.to_string(),
        namespace: ns.to_string(),
        subsets: vec![EndpointSubset {
            addresses: pods
                .iter()
                .map(|(name, ns)| EndpointAddress {
                    ip: "0.0.0.0".to_string(),
                    target_pod: Some((name.to_string(), ns.to_string())),
                })
                .collect(),
            ports: Vec::new(),
        }],
    }
}

fn default_config(acl: bool) -> provider::Config {
    provider::Config {
        acl,
        default_traffic_type: TrafficType::Http,
        min_http_port: 10000,
        max_http_port: 10100,
        mesh_namespace: "traefik-mesh".to_string(),
    }
}

fn fresh_ports() -> PortTable {
    PortTable::new(10000, 10100, (20000, 20100), (30000, 30100))
}

// S1: ACL-off basic HTTP.
#[test]
fn s1_acl_off_basic_http() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("svc-a", "my-ns", vec![numeric_port(8080)]));
    snapshot.pods.push(pod("pod-1", "my-ns", "sa-a", Some("10.10.1.1")));
    snapshot.pods.push(pod("pod-2", "my-ns", "sa-a", Some("10.10.1.2")));
    snapshot
        .endpoints
        .push(endpoints_with_pods("svc-a", "my-ns", &[("pod-1", "my-ns"), ("pod-2", "my-ns")]));

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    assert!(topology.errors.is_empty());

    let mut ports = fresh_ports();
    let (cfg, issues) = provider::provide(&topology, &default_config(false), &mut ports);
    assert!(issues.is_empty());

    let svc_cfg = cfg.http.services.get("svc-a-my-ns-8080").expect("service rendered");
    match svc_cfg {
        HttpService::LoadBalancer(lb) => {
            let urls: Vec<&str> = lb.servers.iter().map(|s| s.url.as_str()).collect();
            assert_eq!(urls, vec!["http://10.10.1.1:8080", "http://10.10.1.2:8080"]);
        }
        _ => panic!("expected a load-balancer service"),
    }

    let router = cfg.http.routers.get("svc-a-my-ns-8080").expect("router rendered");
    assert_eq!(router.entry_points, vec!["http-10000"]);
    assert_eq!(router.rule, r#"Host("svc-a.my-ns.traefik.mesh")"#);
    assert!(!cfg.http.middlewares.contains_key("block-all"));
}

// S2: ACL-on TrafficTarget with an HTTPRouteGroup match.
fn s2_fixture() -> (mesh_core::model::Topology, provider::Config) {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("svc-b", "my-ns", vec![numeric_port(8080)]));
    snapshot.pods.push(pod("server-1", "my-ns", "sa-server", Some("10.10.1.1")));
    snapshot.pods.push(pod("client-1", "my-ns", "sa-client", Some("10.20.1.1")));
    snapshot.pods.push(pod("client-2", "my-ns", "sa-client", Some("10.20.1.2")));
    snapshot
        .endpoints
        .push(endpoints_with_pods("svc-b", "my-ns", &[("server-1", "my-ns")]));
    snapshot.http_route_groups.push(HttpRouteGroupSnapshot {
        name: "rg1".to_string(),
        namespace: "my-ns".to_string(),
        matches: vec![mesh_core::model::HttpMatch {
            name: "api-match".to_string(),
            path_regex: Some("api".to_string()),
            methods: vec!["GET".to_string(), "POST".to_string()],
            headers: BTreeMap::new(),
        }],
    });
    snapshot.traffic_targets.push(TrafficTargetSnapshot {
        name: "tt1".to_string(),
        namespace: "my-ns".to_string(),
        sources: vec![TrafficTargetSource {
            service_account: "sa-client".to_string(),
            namespace: "my-ns".to_string(),
        }],
        destination: TrafficTargetDestination {
            service_account: "sa-server".to_string(),
            namespace: "my-ns".to_string(),
            port: Some(8080),
        },
        rules: vec![TrafficTargetRule::Http {
            route_group: "rg1".to_string(),
            matches: vec!["api-match".to_string()],
        }],
    });

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    (topology, default_config(true))
}

#[test]
fn s2_acl_on_traffic_target() {
    let (topology, config) = s2_fixture();
    assert!(topology.errors.is_empty());

    let mut ports = fresh_ports();
    let (cfg, issues) = provider::provide(&topology, &config, &mut ports);
    assert!(issues.is_empty());

    let block_all = cfg
        .http
        .routers
        .get("svc-b-my-ns-8080-block-all")
        .expect("block-all router rendered");
    assert_eq!(block_all.middlewares, vec!["block-all".to_string()]);

    let direct = cfg
        .http
        .routers
        .get("svc-b-my-ns-8080-tt1-my-ns-direct")
        .expect("direct router rendered");
    assert_eq!(
        direct.rule,
        r#"Host("svc-b.my-ns.traefik.mesh") && (PathPrefix("/{path:api}") && Method("GET", "POST"))"#
    );

    let whitelist_name = direct.middlewares.first().expect("whitelist attached");
    match cfg.http.middlewares.get(whitelist_name).expect("whitelist defined") {
        Middleware::IpWhiteList(wl) => {
            assert_eq!(wl.source_range, vec!["10.20.1.1".to_string(), "10.20.1.2".to_string()]);
            assert_eq!(wl.ip_strategy, IpStrategy::RemoteAddr);
        }
        _ => panic!("expected an IP whitelist middleware"),
    }

    assert!(!cfg.http.routers.contains_key("svc-b-my-ns-8080-tt1-my-ns-indirect"));
}

// S3: Traffic split, HTTP, 80/20 weight.
#[test]
fn s3_traffic_split_weighted() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("svc-b", "my-ns", vec![numeric_port(8080)]));
    snapshot.services.push(svc("svc-b-v1", "my-ns", vec![numeric_port(8080)]));
    snapshot.services.push(svc("svc-b-v2", "my-ns", vec![numeric_port(8080)]));
    snapshot.traffic_splits.push(TrafficSplitSnapshot {
        name: "ts1".to_string(),
        namespace: "my-ns".to_string(),
        root_service: "svc-b".to_string(),
        backends: vec![
            TrafficSplitBackendSnapshot { service: "svc-b-v1".to_string(), weight: 80 },
            TrafficSplitBackendSnapshot { service: "svc-b-v2".to_string(), weight: 20 },
        ],
        rules: None,
    });

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    assert!(topology.errors.is_empty());

    let mut ports = fresh_ports();
    let (cfg, issues) = provider::provide(&topology, &default_config(false), &mut ports);
    assert!(issues.is_empty());

    let weighted = cfg
        .http
        .services
        .get("svc-b-my-ns-8080-ts1-my-ns")
        .expect("weighted service rendered");
    match weighted {
        HttpService::Weighted(wrr) => {
            assert_eq!(wrr.services.len(), 2);
            assert_eq!(wrr.services[0].name, "svc-b-v1-my-ns-8080-ts1-my-ns");
            assert_eq!(wrr.services[0].weight, 80);
            assert_eq!(wrr.services[1].name, "svc-b-v2-my-ns-8080-ts1-my-ns");
            assert_eq!(wrr.services[1].weight, 20);
        }
        _ => panic!("expected a weighted round-robin service"),
    }

    match cfg.http.services.get("svc-b-v1-my-ns-8080-ts1-my-ns").unwrap() {
        HttpService::LoadBalancer(lb) => {
            assert_eq!(lb.servers[0].url, "http://svc-b-v1.my-ns.traefik.mesh:8080");
        }
        _ => panic!("expected a load-balancer service"),
    }
}

// S4: cycle in the TrafficSplit graph.
#[test]
fn s4_split_cycle_detaches_both_splits() {
    let mut snapshot = Snapshot::default();
    for name in ["svc-B", "svc-C", "svc-D", "svc-E"] {
        snapshot.services.push(svc(name, "my-ns", vec![numeric_port(80)]));
    }
    snapshot.traffic_splits.push(TrafficSplitSnapshot {
        name: "ts1".to_string(),
        namespace: "my-ns".to_string(),
        root_service: "svc-B".to_string(),
        backends: vec![
            TrafficSplitBackendSnapshot { service: "svc-C".to_string(), weight: 50 },
            TrafficSplitBackendSnapshot { service: "svc-D".to_string(), weight: 50 },
        ],
        rules: None,
    });
    snapshot.traffic_splits.push(TrafficSplitSnapshot {
        name: "ts2".to_string(),
        namespace: "my-ns".to_string(),
        root_service: "svc-C".to_string(),
        backends: vec![
            TrafficSplitBackendSnapshot { service: "svc-B".to_string(), weight: 50 },
            TrafficSplitBackendSnapshot { service: "svc-E".to_string(), weight: 50 },
        ],
        rules: None,
    });

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();

    let svc_b = &topology.services[&Key::new("svc-B", "my-ns")];
    let svc_c = &topology.services[&Key::new("svc-C", "my-ns")];
    assert!(!svc_b.traffic_splits.contains(&Key::new("ts1", "my-ns")));
    assert!(!svc_c.traffic_splits.contains(&Key::new("ts2", "my-ns")));

    let circular_errors = topology
        .errors
        .iter()
        .filter(|e| matches!(e, mesh_core::error::EntityError::CircularTrafficSplit { .. }))
        .count();
    assert_eq!(circular_errors, 2);
}

// S5: indirect whitelist when the Service is itself a split backend.
#[test]
fn s5_indirect_whitelist_when_backend_of_split() {
    let (topology, config) = {
        let mut snapshot = Snapshot::default();
        snapshot.services.push(svc("svc-b", "my-ns", vec![numeric_port(8080)]));
        snapshot.services.push(svc("other-root", "my-ns", vec![numeric_port(8080)]));
        snapshot.pods.push(pod("server-1", "my-ns", "sa-server", Some("10.10.1.1")));
        snapshot.pods.push(pod("client-1", "my-ns", "sa-client", Some("10.20.1.1")));
        snapshot
            .endpoints
            .push(endpoints_with_pods("svc-b", "my-ns", &[("server-1", "my-ns")]));
        snapshot.http_route_groups.push(HttpRouteGroupSnapshot {
            name: "rg1".to_string(),
            namespace: "my-ns".to_string(),
            matches: vec![mesh_core::model::HttpMatch {
                name: "api-match".to_string(),
                path_regex: None,
                methods: Vec::new(),
                headers: BTreeMap::new(),
            }],
        });
        snapshot.traffic_targets.push(TrafficTargetSnapshot {
            name: "tt1".to_string(),
            namespace: "my-ns".to_string(),
            sources: vec![TrafficTargetSource {
                service_account: "sa-client".to_string(),
                namespace: "my-ns".to_string(),
            }],
            destination: TrafficTargetDestination {
                service_account: "sa-server".to_string(),
                namespace: "my-ns".to_string(),
                port: Some(8080),
            },
            rules: vec![TrafficTargetRule::Http {
                route_group: "rg1".to_string(),
                matches: vec!["api-match".to_string()],
            }],
        });
        snapshot.traffic_splits.push(TrafficSplitSnapshot {
            name: "ts-other".to_string(),
            namespace: "my-ns".to_string(),
            root_service: "other-root".to_string(),
            backends: vec![TrafficSplitBackendSnapshot { service: "svc-b".to_string(), weight: 100 }],
            rules: None,
        });
        (builder::build(&snapshot, &ResourceFilter::default()).unwrap(), default_config(true))
    };
    assert!(!topology.services[&Key::new("svc-b", "my-ns")].backend_of.is_empty());

    let mut ports = fresh_ports();
    let (cfg, issues) = provider::provide(&topology, &config, &mut ports);
    assert!(issues.is_empty());

    let direct = cfg.http.routers.get("svc-b-my-ns-8080-tt1-my-ns-direct").unwrap();
    let indirect = cfg
        .http
        .routers
        .get("svc-b-my-ns-8080-tt1-my-ns-indirect")
        .expect("indirect router rendered");
    assert!(indirect.rule.ends_with(r#"HeadersRegexp("X-Forwarded-For", ".+")"#));
    assert!(indirect.priority > direct.priority);

    let wl_name = indirect.middlewares.first().unwrap();
    match cfg.http.middlewares.get(wl_name).unwrap() {
        Middleware::IpWhiteList(wl) => assert_eq!(wl.ip_strategy, IpStrategy::Depth(1)),
        _ => panic!("expected an IP whitelist middleware"),
    }
}

// S6: named targetPort resolved via two Endpoints subsets.
#[test]
fn s6_named_target_port_across_subsets() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc(
        "svc-web",
        "my-ns",
        vec![ServicePort {
            name: Some("web".to_string()),
            port: 80,
            target_port: TargetPort::Name("name".to_string()),
            protocol: Protocol::Tcp,
        }],
    ));
    snapshot.pods.push(pod("v1", "my-ns", "sa-web", Some("10.30.1.1")));
    snapshot.pods.push(pod("v2", "my-ns", "sa-web", Some("10.30.1.2")));
    snapshot.endpoints.push(EndpointsSnapshot {
        name: "svc-web".to_string(),
        namespace: "my-ns".to_string(),
        subsets: vec![
            EndpointSubset {
                addresses: vec![EndpointAddress {
                    ip: "10.30.1.1".to_string(),
                    target_pod: Some(("v1".to_string(), "my-ns".to_string())),
                }],
                ports: vec![EndpointPort { name: Some("name".to_string()), port: 8080, protocol: Protocol::Tcp }],
            },
            EndpointSubset {
                addresses: vec![
                    EndpointAddress {
                        ip: "10.30.1.1".to_string(),
                        target_pod: Some(("v1".to_string(), "my-ns".to_string())),
                    },
                    EndpointAddress {
                        ip: "10.30.1.2".to_string(),
                        target_pod: Some(("v2".to_string(), "my-ns".to_string())),
                    },
                ],
                ports: vec![EndpointPort { name: Some("name".to_string()), port: 8080, protocol: Protocol::Tcp }],
            },
        ],
    });

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    let service = &topology.services[&Key::new("svc-web", "my-ns")];
    assert_eq!(service.pods, vec![Key::new("v1", "my-ns"), Key::new("v2", "my-ns")]);
    assert_eq!(service.backend_port(80), 8080);
}

// Property: determinism across repeated builds+renders of the same inputs.
#[test]
fn determinism_across_repeated_runs() {
    let (topology, config) = s2_fixture();
    let (cfg_a, _) = provider::provide(&topology, &config, &mut fresh_ports());
    let (cfg_b, _) = provider::provide(&topology, &config, &mut fresh_ports());
    assert_eq!(cfg_a, cfg_b);
}

// Property: an ignored namespace leaves no trace in the topology.
#[test]
fn filter_respects_ignored_namespace() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("svc-a", "my-ns", vec![numeric_port(8080)]));
    snapshot.services.push(svc("svc-hidden", "ignored-ns", vec![numeric_port(8080)]));

    let filter = ResourceFilter::new(vec!["ignored-ns".to_string()], BTreeMap::new());
    let topology = builder::build(&snapshot, &filter).unwrap();

    assert!(topology.services.contains_key(&Key::new("svc-a", "my-ns")));
    assert!(!topology.services.contains_key(&Key::new("svc-hidden", "ignored-ns")));
}

// Property: ACL-on totality — a Service with no TrafficTargets/Splits only
// ever gets the block-all router.
#[test]
fn acl_totality_for_unattached_service() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("svc-lonely", "my-ns", vec![numeric_port(8080)]));
    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();

    let mut ports = fresh_ports();
    let (cfg, _) = provider::provide(&topology, &default_config(true), &mut ports);

    let routers: Vec<&HttpRouter> = cfg
        .http
        .routers
        .iter()
        .filter(|(name, _)| name.starts_with("svc-lonely-"))
        .map(|(_, r)| r)
        .collect();
    assert_eq!(routers.len(), 1);
    assert_eq!(routers[0].service, "block-all");
}

// Property: backend-port compatibility — a backend missing a root port is
// rejected rather than silently truncated.
#[test]
fn backend_missing_root_port_rejects_split() {
    let mut snapshot = Snapshot::default();
    snapshot.services.push(svc("root", "my-ns", vec![numeric_port(80), numeric_port(443)]));
    snapshot.services.push(svc("backend", "my-ns", vec![numeric_port(80)]));
    snapshot.traffic_splits.push(TrafficSplitSnapshot {
        name: "ts1".to_string(),
        namespace: "my-ns".to_string(),
        root_service: "root".to_string(),
        backends: vec![TrafficSplitBackendSnapshot { service: "backend".to_string(), weight: 100 }],
        rules: None,
    });

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    assert!(!topology.traffic_splits.contains_key(&Key::new("ts1", "my-ns")));
    assert!(topology
        .errors
        .iter()
        .any(|e| matches!(e, mesh_core::error::EntityError::BackendPortMissing { .. })));
}

// Property: non-HTTP traffic types render TCP/UDP routers instead.
#[test]
fn tcp_traffic_type_renders_tcp_router() {
    let mut snapshot = Snapshot::default();
    let mut service = svc("svc-tcp", "my-ns", vec![numeric_port(9000)]);
    service
        .annotations
        .insert("mesh.traefik.io/traffic-type".to_string(), "tcp".to_string());
    snapshot.services.push(service);
    snapshot.pods.push(pod("pod-1", "my-ns", "sa", Some("10.40.1.1")));
    snapshot
        .endpoints
        .push(endpoints_with_pods("svc-tcp", "my-ns", &[("pod-1", "my-ns")]));

    let topology = builder::build(&snapshot, &ResourceFilter::default()).unwrap();
    let mut ports = fresh_ports();
    let (cfg, issues) = provider::provide(&topology, &default_config(false), &mut ports);
    assert!(issues.is_empty());

    match cfg.tcp.services.get("svc-tcp-my-ns-9000").unwrap() {
        TcpUdpService::LoadBalancer(lb) => assert_eq!(lb.servers[0].address, "10.40.1.1:9000"),
        _ => panic!("expected a load-balancer service"),
    }
    assert!(!cfg.http.services.contains_key("svc-tcp-my-ns-9000"));
}
