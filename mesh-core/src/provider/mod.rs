//! Configuration Provider (spec §4.2): renders a `DynamicConfig` from a
//! `Topology` and a fixed `Config`.

pub mod config;
pub mod rules;

use crate::error::{EntityError, PortAllocError};
use crate::key::Key;
use crate::model::{Service, Topology};
use crate::ports::{PortProtocol, PortTable, ServicePortRef};
use config::*;
use rules::{http_match_predicate, priority, service_host_rule, with_indirect_suffix, RouterClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    Http,
    Tcp,
    Udp,
}

impl TrafficType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Self::Http),
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    H2c,
    Https,
}

impl Scheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Self::Http),
            "h2c" => Some(Self::H2c),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::H2c => "h2c",
            Scheme::Https => "https",
        }
    }
}

/// Fixed provider configuration (spec §4.2).
#[derive(Debug, Clone)]
pub struct Config {
    pub acl: bool,
    pub default_traffic_type: TrafficType,
    pub min_http_port: u16,
    pub max_http_port: u16,
    pub mesh_namespace: String,
}

pub mod annotation {
    pub const TRAFFIC_TYPE: &str = "mesh.traefik.io/traffic-type";
    pub const SCHEME: &str = "mesh.traefik.io/scheme";
    pub const RETRY_ATTEMPTS: &str = "mesh.traefik.io/retry-attempts";
    pub const CIRCUIT_BREAKER_EXPRESSION: &str = "mesh.traefik.io/circuit-breaker-expression";
    pub const RATELIMIT_AVERAGE: &str = "mesh.traefik.io/ratelimit-average";
    pub const RATELIMIT_BURST: &str = "mesh.traefik.io/ratelimit-burst";
}

/// A fault recorded while rendering the configuration: either a per-entity
/// semantic fault (spec §7 `EntityError`) or the Port Allocator refusing to
/// hand out an entrypoint (spec §7 `EntrypointExhausted`).
#[derive(Debug, Clone)]
pub enum ProviderIssue {
    Entity(EntityError),
    PortAlloc(PortAllocError),
}

impl From<EntityError> for ProviderIssue {
    fn from(e: EntityError) -> Self {
        ProviderIssue::Entity(e)
    }
}
impl From<PortAllocError> for ProviderIssue {
    fn from(e: PortAllocError) -> Self {
        ProviderIssue::PortAlloc(e)
    }
}

struct ServiceMiddlewares {
    names: Vec<String>,
    definitions: Vec<(String, Middleware)>,
}

/// Render the full `DynamicConfig` for every Service in `topology`, allocating
/// proxy entrypoints from `ports` as it goes. Per-Service/per-annotation
/// faults are collected rather than aborting the whole render (spec §7).
pub fn provide(
    topology: &Topology,
    config: &Config,
    ports: &mut PortTable,
) -> (DynamicConfig, Vec<ProviderIssue>) {
    let mut cfg = DynamicConfig::default();
    let mut issues = Vec::new();

    install_readiness(&mut cfg);

    for service in topology.services.values() {
        if let Err(e) = render_service(service, topology, config, ports, &mut cfg, &mut issues) {
            issues.push(e.into());
        }
    }

    (cfg, issues)
}

fn install_readiness(cfg: &mut DynamicConfig) {
    cfg.http.services.insert(
        READINESS_SERVICE.to_string(),
        HttpService::LoadBalancer(LoadBalancer {
            servers: vec![HttpServer {
                url: READINESS_BACKEND.to_string(),
            }],
            pass_host_header: true,
        }),
    );
    cfg.http.routers.insert(
        READINESS_ROUTER.to_string(),
        HttpRouter {
            entry_points: vec![READINESS_ENTRYPOINT.to_string()],
            rule: "PathPrefix(\"/\")".to_string(),
            service: READINESS_SERVICE.to_string(),
            priority: 1,
            middlewares: Vec::new(),
        },
    );
}

fn base_name(key: &Key) -> String {
    format!("{}-{}", key.name, key.namespace)
}

fn resolve_traffic_type(service: &Service, config: &Config) -> Result<TrafficType, EntityError> {
    match service.annotations.get(annotation::TRAFFIC_TYPE) {
        None => Ok(config.default_traffic_type),
        Some(v) => TrafficType::parse(v).ok_or_else(|| EntityError::UnknownTrafficType {
            service: service.key.clone(),
            value: v.clone(),
        }),
    }
}

fn resolve_scheme(service: &Service) -> Result<Scheme, EntityError> {
    match service.annotations.get(annotation::SCHEME) {
        None => Ok(Scheme::Http),
        Some(v) => Scheme::parse(v).ok_or_else(|| EntityError::UnknownScheme {
            service: service.key.clone(),
            value: v.clone(),
        }),
    }
}

fn resolve_middlewares(service: &Service) -> Result<ServiceMiddlewares, EntityError> {
    let mut names = Vec::new();
    let mut definitions = Vec::new();
    let base = base_name(&service.key);

    if let Some(expr) = service.annotations.get(annotation::CIRCUIT_BREAKER_EXPRESSION) {
        let name = format!("{base}-circuit-breaker");
        definitions.push((
            name.clone(),
            Middleware::CircuitBreaker(CircuitBreaker {
                expression: expr.clone(),
            }),
        ));
        names.push(name);
    }

    if let Some(raw) = service.annotations.get(annotation::RETRY_ATTEMPTS) {
        let attempts: u32 = raw
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| EntityError::InvalidAnnotation {
                service: service.key.clone(),
                annotation: annotation::RETRY_ATTEMPTS.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
        let name = format!("{base}-retry");
        definitions.push((name.clone(), Middleware::Retry(Retry { attempts })));
        names.push(name);
    }

    let average = service.annotations.get(annotation::RATELIMIT_AVERAGE);
    let burst = service.annotations.get(annotation::RATELIMIT_BURST);
    match (average, burst) {
        (None, None) => {}
        (Some(_), None) | (None, Some(_)) => {
            return Err(EntityError::InvalidAnnotation {
                service: service.key.clone(),
                annotation: format!(
                    "{}/{}",
                    annotation::RATELIMIT_AVERAGE,
                    annotation::RATELIMIT_BURST
                ),
                reason: "both average and burst must be set together".to_string(),
            })
        }
        (Some(a), Some(b)) => {
            let invalid = || EntityError::InvalidAnnotation {
                service: service.key.clone(),
                annotation: format!(
                    "{}/{}",
                    annotation::RATELIMIT_AVERAGE,
                    annotation::RATELIMIT_BURST
                ),
                reason: "both must be positive integers".to_string(),
            };
            let average: u32 = a.parse().ok().filter(|n| *n > 0).ok_or_else(invalid)?;
            let burst: u32 = b.parse().ok().filter(|n| *n > 0).ok_or_else(invalid)?;
            let name = format!("{base}-ratelimit");
            definitions.push((name.clone(), Middleware::RateLimit(RateLimit { average, burst })));
            names.push(name);
        }
    }

    Ok(ServiceMiddlewares { names, definitions })
}

fn render_service(
    service: &Service,
    topology: &Topology,
    config: &Config,
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) -> Result<(), EntityError> {
    let traffic_type = resolve_traffic_type(service, config)?;

    if traffic_type != TrafficType::Http {
        render_non_http_service(service, topology, traffic_type, ports, cfg, issues);
        render_splits_non_http(service, topology, traffic_type, ports, cfg, issues);
        return Ok(());
    }

    let scheme = resolve_scheme(service)?;
    let middlewares = resolve_middlewares(service)?;
    for (name, def) in middlewares.definitions {
        cfg.http.middlewares.insert(name, def);
    }

    if !config.acl {
        render_http_acl_off(service, topology, scheme, &middlewares.names, ports, cfg, issues);
    } else {
        render_http_acl_on(service, topology, scheme, &middlewares.names, ports, cfg, issues);
    }

    render_http_splits(
        service,
        topology,
        scheme,
        config.acl,
        &middlewares.names,
        ports,
        cfg,
        issues,
    );

    Ok(())
}

fn alloc_http(
    ports: &mut PortTable,
    service: &Service,
    sp_port: u16,
    ordinal: usize,
    issues: &mut Vec<ProviderIssue>,
) -> Option<u16> {
    match ports.http_port(
        ServicePortRef {
            service: service.key.clone(),
            port: sp_port,
        },
        ordinal,
    ) {
        Ok(p) => Some(p),
        Err(e) => {
            issues.push(e.into());
            None
        }
    }
}

fn alloc_tcp_udp(
    ports: &mut PortTable,
    protocol: PortProtocol,
    service: &Service,
    sp_port: u16,
    issues: &mut Vec<ProviderIssue>,
) -> Option<u16> {
    let svc_ref = ServicePortRef {
        service: service.key.clone(),
        port: sp_port,
    };
    let result = match protocol {
        PortProtocol::Tcp => ports.tcp_port(svc_ref),
        PortProtocol::Udp => ports.udp_port(svc_ref),
        PortProtocol::Http => unreachable!("alloc_tcp_udp only handles tcp/udp"),
    };
    match result {
        Ok(p) => Some(p),
        Err(e) => {
            issues.push(e.into());
            None
        }
    }
}

fn http_servers_for(keys: &[Key], topology: &Topology, scheme: Scheme, backend_port: u16) -> Vec<HttpServer> {
    keys.iter()
        .filter_map(|k| topology.pods.get(k))
        .filter_map(|p| p.ip.as_deref())
        .map(|ip| HttpServer {
            url: format!("{}://{}:{}", scheme.as_str(), ip, backend_port),
        })
        .collect()
}

fn tcp_udp_servers_for(keys: &[Key], topology: &Topology, backend_port: u16) -> Vec<TcpUdpServer> {
    keys.iter()
        .filter_map(|k| topology.pods.get(k))
        .filter_map(|p| p.ip.as_deref())
        .map(|ip| TcpUdpServer {
            address: format!("{}:{}", ip, backend_port),
        })
        .collect()
}

fn protocol_prefix(protocol: PortProtocol) -> &'static str {
    match protocol {
        PortProtocol::Http => "http",
        PortProtocol::Tcp => "tcp",
        PortProtocol::Udp => "udp",
    }
}

fn sanitize(key: &Key) -> String {
    format!("{}-{}", key.name, key.namespace)
}

fn render_http_acl_off(
    service: &Service,
    topology: &Topology,
    scheme: Scheme,
    middlewares: &[String],
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) {
    let base = base_name(&service.key);

    for (ordinal, sp) in service.ports.iter().enumerate() {
        let Some(entry_port) = alloc_http(ports, service, sp.port, ordinal, issues) else {
            continue;
        };
        let backend_port = service.backend_port(sp.port);
        let servers = http_servers_for(&service.pods, topology, scheme, backend_port);

        let svc_name = format!("{base}-{}", sp.port);
        cfg.http.services.insert(
            svc_name.clone(),
            HttpService::LoadBalancer(LoadBalancer {
                servers,
                pass_host_header: true,
            }),
        );

        let rule = service_host_rule(&service.key, service.cluster_ip.as_deref());
        let prio = priority(RouterClass::Service, &rule);
        cfg.http.routers.insert(
            svc_name.clone(),
            HttpRouter {
                entry_points: vec![format!("http-{entry_port}")],
                rule,
                service: svc_name,
                priority: prio,
                middlewares: middlewares.to_vec(),
            },
        );
    }
}

fn render_non_http_service(
    service: &Service,
    topology: &Topology,
    traffic_type: TrafficType,
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) {
    let base = base_name(&service.key);
    let protocol = match traffic_type {
        TrafficType::Tcp => PortProtocol::Tcp,
        TrafficType::Udp => PortProtocol::Udp,
        TrafficType::Http => unreachable!(),
    };

    for sp in &service.ports {
        let Some(entry_port) = alloc_tcp_udp(ports, protocol, service, sp.port, issues) else {
            continue;
        };
        let backend_port = service.backend_port(sp.port);
        let svc_name = format!("{base}-{}", sp.port);
        let servers = tcp_udp_servers_for(&service.pods, topology, backend_port);

        let router = TcpUdpRouter {
            entry_points: vec![format!("{}-{entry_port}", protocol_prefix(protocol))],
            rule: Some(rules::CATCH_ALL_SNI_RULE.to_string()),
            service: svc_name.clone(),
            priority: priority(RouterClass::Service, rules::CATCH_ALL_SNI_RULE),
        };
        let service_cfg = TcpUdpService::LoadBalancer(LoadBalancer {
            servers,
            pass_host_header: false,
        });

        match traffic_type {
            TrafficType::Tcp => {
                cfg.tcp.routers.insert(svc_name.clone(), router);
                cfg.tcp.services.insert(svc_name, service_cfg);
            }
            TrafficType::Udp => {
                cfg.udp.routers.insert(svc_name.clone(), router);
                cfg.udp.services.insert(svc_name, service_cfg);
            }
            TrafficType::Http => unreachable!(),
        }
    }
}

fn render_http_acl_on(
    service: &Service,
    topology: &Topology,
    scheme: Scheme,
    middlewares: &[String],
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) {
    let base = base_name(&service.key);

    cfg.http
        .middlewares
        .entry(BLOCK_ALL_MIDDLEWARE.to_string())
        .or_insert_with(|| {
            Middleware::IpWhiteList(IpWhiteList {
                source_range: vec![BLOCK_ALL_SENTINEL.to_string()],
                ip_strategy: IpStrategy::RemoteAddr,
            })
        });
    cfg.http
        .services
        .entry(BLOCK_ALL_MIDDLEWARE.to_string())
        .or_insert_with(|| {
            HttpService::LoadBalancer(LoadBalancer {
                servers: vec![HttpServer {
                    url: format!("http://{BLOCK_ALL_SENTINEL}"),
                }],
                pass_host_header: true,
            })
        });

    for (ordinal, sp) in service.ports.iter().enumerate() {
        let Some(entry_port) = alloc_http(ports, service, sp.port, ordinal, issues) else {
            continue;
        };
        let rule = service_host_rule(&service.key, service.cluster_ip.as_deref());
        let prio = priority(RouterClass::Service, &rule);
        let router_name = format!("{base}-{}-block-all", sp.port);
        cfg.http.routers.insert(
            router_name,
            HttpRouter {
                entry_points: vec![format!("http-{entry_port}")],
                rule,
                service: BLOCK_ALL_MIDDLEWARE.to_string(),
                priority: prio,
                middlewares: vec![BLOCK_ALL_MIDDLEWARE.to_string()],
            },
        );
    }

    for stt_key in &service.traffic_targets {
        let Some(stt) = topology.service_traffic_targets.get(stt_key) else {
            continue;
        };

        let source_ips: Vec<String> = stt
            .source_pod_keys()
            .filter_map(|k| topology.pods.get(k))
            .filter_map(|p| p.ip.clone())
            .collect();

        for dest_port in &stt.destination.ports {
            let ordinal = service
                .ports
                .iter()
                .position(|p| p.port == dest_port.port)
                .unwrap_or(0);
            let Some(entry_port) = alloc_http(ports, service, dest_port.port, ordinal, issues) else {
                continue;
            };
            let backend_port = service.backend_port(dest_port.port);
            let servers = http_servers_for(&stt.destination.pods, topology, scheme, backend_port);

            let svc_name = format!("{base}-{}-{}", dest_port.port, sanitize(&stt_key.traffic_target));
            cfg.http.services.insert(
                svc_name.clone(),
                HttpService::LoadBalancer(LoadBalancer {
                    servers,
                    pass_host_header: true,
                }),
            );

            let host_rule = service_host_rule(&service.key, service.cluster_ip.as_deref());
            let predicate = http_match_predicate(&stt.specs);
            let direct_rule = match &predicate {
                Some(p) => format!("{} && ({})", host_rule, p),
                None => host_rule.clone(),
            };

            let direct_whitelist_name = format!("{svc_name}-direct-whitelist");
            cfg.http.middlewares.insert(
                direct_whitelist_name.clone(),
                Middleware::IpWhiteList(IpWhiteList {
                    source_range: source_ips.clone(),
                    ip_strategy: IpStrategy::RemoteAddr,
                }),
            );
            let mut direct_middlewares = vec![direct_whitelist_name];
            direct_middlewares.extend(middlewares.iter().cloned());

            let direct_prio = priority(RouterClass::TrafficTargetDirect, &direct_rule);
            cfg.http.routers.insert(
                format!("{svc_name}-direct"),
                HttpRouter {
                    entry_points: vec![format!("http-{entry_port}")],
                    rule: direct_rule.clone(),
                    service: svc_name.clone(),
                    priority: direct_prio,
                    middlewares: direct_middlewares,
                },
            );

            if !service.backend_of.is_empty() {
                let indirect_rule = with_indirect_suffix(&direct_rule);
                let indirect_whitelist_name = format!("{svc_name}-indirect-whitelist");
                cfg.http.middlewares.insert(
                    indirect_whitelist_name.clone(),
                    Middleware::IpWhiteList(IpWhiteList {
                        source_range: source_ips.clone(),
                        ip_strategy: IpStrategy::Depth(1),
                    }),
                );
                let mut indirect_middlewares = vec![indirect_whitelist_name];
                indirect_middlewares.extend(middlewares.iter().cloned());
                let indirect_prio = priority(RouterClass::TrafficTargetIndirect, &indirect_rule);
                cfg.http.routers.insert(
                    format!("{svc_name}-indirect"),
                    HttpRouter {
                        entry_points: vec![format!("http-{entry_port}")],
                        rule: indirect_rule,
                        service: svc_name,
                        priority: indirect_prio,
                        middlewares: indirect_middlewares,
                    },
                );
            }
        }
    }
}

fn render_http_splits(
    service: &Service,
    topology: &Topology,
    scheme: Scheme,
    acl: bool,
    middlewares: &[String],
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) {
    let base = base_name(&service.key);
    for split_key in &service.traffic_splits {
        let Some(split) = topology.traffic_splits.get(split_key) else {
            continue;
        };
        if split.backends.iter().map(|b| b.weight).sum::<u32>() == 0 {
            continue;
        }

        for (ordinal, sp) in service.ports.iter().enumerate() {
            let Some(entry_port) = alloc_http(ports, service, sp.port, ordinal, issues) else {
                continue;
            };

            let weighted_name = format!("{base}-{}-{}", sp.port, sanitize(split_key));
            let backend_refs: Vec<WeightedServiceRef> = split
                .backends
                .iter()
                .map(|b| {
                    let svc_name = format!("{}-{}-{}", sanitize(&b.service), sp.port, sanitize(split_key));
                    let backend_port = topology
                        .services
                        .get(&b.service)
                        .map(|s| s.backend_port(sp.port))
                        .unwrap_or(sp.port);
                    cfg.http.services.insert(
                        svc_name.clone(),
                        HttpService::LoadBalancer(LoadBalancer {
                            servers: vec![HttpServer {
                                url: format!(
                                    "{}://{}.{}.traefik.mesh:{}",
                                    scheme.as_str(),
                                    b.service.name,
                                    b.service.namespace,
                                    backend_port
                                ),
                            }],
                            pass_host_header: false,
                        }),
                    );
                    WeightedServiceRef {
                        name: svc_name,
                        weight: b.weight,
                    }
                })
                .collect();

            cfg.http.services.insert(
                weighted_name.clone(),
                HttpService::Weighted(WeightedRoundRobin {
                    services: backend_refs,
                }),
            );

            let host_rule = service_host_rule(&service.key, service.cluster_ip.as_deref());
            let predicate = split.rules.as_ref().and_then(|r| http_match_predicate(r));
            let direct_rule = match &predicate {
                Some(p) => format!("{} && ({})", host_rule, p),
                None => host_rule.clone(),
            };
            let direct_prio = priority(RouterClass::TrafficSplit, &direct_rule);

            let mut direct_middlewares = middlewares.to_vec();
            if acl {
                let wl_name = format!("{weighted_name}-direct-whitelist");
                cfg.http.middlewares.insert(
                    wl_name.clone(),
                    Middleware::IpWhiteList(IpWhiteList {
                        source_range: sorted_ips(&split.incoming, topology),
                        ip_strategy: IpStrategy::RemoteAddr,
                    }),
                );
                direct_middlewares.insert(0, wl_name);
            }

            cfg.http.routers.insert(
                format!("{weighted_name}-direct"),
                HttpRouter {
                    entry_points: vec![format!("http-{entry_port}")],
                    rule: direct_rule.clone(),
                    service: weighted_name.clone(),
                    priority: direct_prio,
                    middlewares: direct_middlewares,
                },
            );

            if acl && !service.backend_of.is_empty() {
                let indirect_rule = with_indirect_suffix(&direct_rule);
                let wl_name = format!("{weighted_name}-indirect-whitelist");
                cfg.http.middlewares.insert(
                    wl_name.clone(),
                    Middleware::IpWhiteList(IpWhiteList {
                        source_range: sorted_ips(&split.incoming, topology),
                        ip_strategy: IpStrategy::Depth(1),
                    }),
                );
                let mut indirect_middlewares = middlewares.to_vec();
                indirect_middlewares.insert(0, wl_name);
                let indirect_prio = priority(RouterClass::TrafficTargetIndirect, &indirect_rule);
                cfg.http.routers.insert(
                    format!("{weighted_name}-indirect"),
                    HttpRouter {
                        entry_points: vec![format!("http-{entry_port}")],
                        rule: indirect_rule,
                        service: weighted_name,
                        priority: indirect_prio,
                        middlewares: indirect_middlewares,
                    },
                );
            }
        }
    }
}

fn sorted_ips(pods: &std::collections::BTreeSet<Key>, topology: &Topology) -> Vec<String> {
    pods.iter()
        .filter_map(|k| topology.pods.get(k))
        .filter_map(|p| p.ip.clone())
        .collect()
}

fn render_splits_non_http(
    service: &Service,
    topology: &Topology,
    traffic_type: TrafficType,
    ports: &mut PortTable,
    cfg: &mut DynamicConfig,
    issues: &mut Vec<ProviderIssue>,
) {
    let protocol = match traffic_type {
        TrafficType::Tcp => PortProtocol::Tcp,
        TrafficType::Udp => PortProtocol::Udp,
        TrafficType::Http => return,
    };
    let base = base_name(&service.key);

    for split_key in &service.traffic_splits {
        let Some(split) = topology.traffic_splits.get(split_key) else {
            continue;
        };
        for sp in &service.ports {
            let Some(entry_port) = alloc_tcp_udp(ports, protocol, service, sp.port, issues) else {
                continue;
            };
            let weighted_name = format!("{base}-{}-{}", sp.port, sanitize(split_key));
            let backend_refs: Vec<WeightedServiceRef> = split
                .backends
                .iter()
                .map(|b| {
                    let svc_name = format!("{}-{}-{}", sanitize(&b.service), sp.port, sanitize(split_key));
                    let backend_port = topology
                        .services
                        .get(&b.service)
                        .map(|s| s.backend_port(sp.port))
                        .unwrap_or(sp.port);
                    let address = format!("{}.{}.traefik.mesh:{}", b.service.name, b.service.namespace, backend_port);
                    match protocol {
                        PortProtocol::Tcp => {
                            cfg.tcp.services.entry(svc_name.clone()).or_insert_with(|| {
                                TcpUdpService::LoadBalancer(LoadBalancer {
                                    servers: vec![TcpUdpServer { address: address.clone() }],
                                    pass_host_header: false,
                                })
                            });
                        }
                        PortProtocol::Udp => {
                            cfg.udp.services.entry(svc_name.clone()).or_insert_with(|| {
                                TcpUdpService::LoadBalancer(LoadBalancer {
                                    servers: vec![TcpUdpServer { address: address.clone() }],
                                    pass_host_header: false,
                                })
                            });
                        }
                        PortProtocol::Http => unreachable!(),
                    }
                    WeightedServiceRef {
                        name: svc_name,
                        weight: b.weight,
                    }
                })
                .collect();

            let weighted_service = TcpUdpService::Weighted(WeightedRoundRobin { services: backend_refs });
            let router = TcpUdpRouter {
                entry_points: vec![format!("{}-{entry_port}", protocol_prefix(protocol))],
                rule: Some(rules::CATCH_ALL_SNI_RULE.to_string()),
                service: weighted_name.clone(),
                priority: priority(RouterClass::TrafficSplit, rules::CATCH_ALL_SNI_RULE),
            };

            match protocol {
                PortProtocol::Tcp => {
                    cfg.tcp.services.insert(weighted_name.clone(), weighted_service);
                    cfg.tcp.routers.insert(format!("{weighted_name}-direct"), router);
                }
                PortProtocol::Udp => {
                    cfg.udp.services.insert(weighted_name.clone(), weighted_service);
                    cfg.udp.routers.insert(format!("{weighted_name}-direct"), router);
                }
                PortProtocol::Http => unreachable!(),
            }
        }
    }
}
