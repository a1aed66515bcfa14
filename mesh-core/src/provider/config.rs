//! `DynamicConfig`: the language-neutral routing configuration the
//! Configuration Provider emits (spec §3, §6). Shaped like the proxy
//! fleet's native dynamic-configuration schema (per-protocol routers,
//! services, and — HTTP only — middlewares), published as JSON from
//! `GET /api/configuration/current`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DynamicConfig {
    #[serde(rename = "HTTP")]
    pub http: HttpConfig,
    #[serde(rename = "TCP")]
    pub tcp: TcpConfig,
    #[serde(rename = "UDP")]
    pub udp: UdpConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub routers: BTreeMap<String, HttpRouter>,
    pub services: BTreeMap<String, HttpService>,
    pub middlewares: BTreeMap<String, Middleware>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TcpConfig {
    pub routers: BTreeMap<String, TcpUdpRouter>,
    pub services: BTreeMap<String, TcpUdpService>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UdpConfig {
    pub routers: BTreeMap<String, TcpUdpRouter>,
    pub services: BTreeMap<String, TcpUdpService>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouter {
    pub entry_points: Vec<String>,
    pub rule: String,
    pub service: String,
    pub priority: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub middlewares: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TcpUdpRouter {
    pub entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub service: String,
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpServer {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TcpUdpServer {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedServiceRef {
    pub name: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer<S> {
    pub servers: Vec<S>,
    pub pass_host_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedRoundRobin {
    pub services: Vec<WeightedServiceRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum HttpService {
    LoadBalancer(LoadBalancer<HttpServer>),
    Weighted(WeightedRoundRobin),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TcpUdpService {
    LoadBalancer(LoadBalancer<TcpUdpServer>),
    Weighted(WeightedRoundRobin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IpStrategy {
    /// Evaluate against the connection's remote address (direct whitelist).
    RemoteAddr,
    /// Evaluate against the `depth`-th hop of `X-Forwarded-For` (indirect
    /// whitelist). Spec §9 Open Question 1 fixes `depth = 1`.
    Depth(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpWhiteList {
    pub source_range: Vec<String>,
    pub ip_strategy: IpStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreaker {
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Retry {
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub average: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Middleware {
    IpWhiteList(IpWhiteList),
    CircuitBreaker(CircuitBreaker),
    Retry(Retry),
    RateLimit(RateLimit),
}

/// Unreachable sentinel used by the ACL-on deny-all middleware (spec §4.2
/// step 4, §8 invariant 4).
pub const BLOCK_ALL_SENTINEL: &str = "255.255.255.255";
pub const BLOCK_ALL_MIDDLEWARE: &str = "block-all";

pub const READINESS_ROUTER: &str = "readiness";
pub const READINESS_ENTRYPOINT: &str = "readiness";
pub const READINESS_SERVICE: &str = "readiness";
pub const READINESS_BACKEND: &str = "http://127.0.0.1:8080";
