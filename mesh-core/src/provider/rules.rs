//! Router rule construction and priority computation (spec §4.2 "Router
//! rule construction" / "Router priority").

use crate::key::Key;
use crate::model::{HttpMatch, TrafficSpec};

pub const CATCH_ALL_SNI_RULE: &str = "HostSNI(`*`)";
pub const XFF_HEADER_RULE: &str = r#"HeadersRegexp("X-Forwarded-For", ".+")"#;

/// `Host("<name>.<ns>.traefik.mesh") || Host("<clusterIP>")`, or just the
/// mesh-DNS host when no cluster IP is assigned yet.
pub fn service_host_rule(service: &Key, cluster_ip: Option<&str>) -> String {
    let mesh_host = format!(
        r#"Host("{}.{}.traefik.mesh")"#,
        service.name, service.namespace
    );
    match cluster_ip {
        Some(ip) if !ip.is_empty() => format!(r#"{} || Host("{}")"#, mesh_host, ip),
        _ => mesh_host,
    }
}

/// `OR` across specs; within each match, `AND` of path prefix, method
/// filter, and header-regex conjuncts. An empty predicate (no specs, or
/// specs with no HTTP matches) is the identity — callers should skip
/// appending it to the rule entirely when this returns `None`.
pub fn http_match_predicate(specs: &[TrafficSpec]) -> Option<String> {
    let clauses: Vec<String> = specs
        .iter()
        .filter_map(|spec| match spec {
            TrafficSpec::Http { matches, .. } => {
                let per_match: Vec<String> = matches.iter().map(single_match_clause).collect();
                if per_match.is_empty() {
                    None
                } else {
                    Some(per_match.join(" || "))
                }
            }
            TrafficSpec::Tcp { .. } => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    if clauses.is_empty() {
        None
    } else if clauses.len() == 1 {
        Some(clauses.into_iter().next().unwrap())
    } else {
        Some(clauses.into_iter().map(|c| format!("({})", c)).collect::<Vec<_>>().join(" || "))
    }
}

fn single_match_clause(m: &HttpMatch) -> String {
    let mut conjuncts = Vec::new();
    if let Some(path) = &m.path_regex {
        conjuncts.push(format!(r#"PathPrefix("/{{path:{}}}")"#, path));
    }
    if !m.methods.is_empty() && !m.methods.iter().any(|meth| meth == "*") {
        let methods = m
            .methods
            .iter()
            .map(|meth| format!("\"{}\"", meth))
            .collect::<Vec<_>>()
            .join(", ");
        conjuncts.push(format!("Method({})", methods));
    }
    for (header, regex) in &m.headers {
        conjuncts.push(format!(r#"HeadersRegexp("{}", "{}")"#, header, regex));
    }
    conjuncts.join(" && ")
}

/// Append the indirect-whitelist clause (spec §4.2: "Indirect variant
/// appends `&& HeadersRegexp("X-Forwarded-For", ".+")`").
pub fn with_indirect_suffix(rule: &str) -> String {
    format!("{} && {}", rule, XFF_HEADER_RULE)
}

/// Priority tiers (spec §4.2 "Router priority"): a TrafficSplit on a
/// Service must pre-empt a direct route on the same host, and indirect
/// variants naturally win over direct via their longer rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouterClass {
    Service = 1,
    TrafficTargetDirect = 2,
    TrafficTargetIndirect = 3,
    TrafficSplit = 4,
}

impl RouterClass {
    fn multiplier(self) -> u32 {
        self as u32 * 1000
    }
}

/// `priority = class * 1000 + count_of("&&") + count_of("||")`.
pub fn priority(class: RouterClass, rule: &str) -> u32 {
    let ands = rule.matches("&&").count() as u32;
    let ors = rule.matches("||").count() as u32;
    class.multiplier() + ands + ors
}
