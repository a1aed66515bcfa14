//! SMI custom resource definitions consumed by the Topology Builder (spec.md
//! §6 "Inbound"), styled after `operator/src/crd/site.rs` and
//! `operator/src/crd/policy.rs`'s `#[derive(CustomResource)]` pattern.

pub mod http_route_group;
pub mod tcp_route;
pub mod traffic_split;
pub mod traffic_target;

pub use http_route_group::{HttpMatchSpec, HttpRouteGroup, HttpRouteGroupSpec};
pub use tcp_route::{TcpRoute, TcpRouteSpec};
pub use traffic_split::{RouteRef, TrafficSplit, TrafficSplitBackendSpec, TrafficSplitSpec};
pub use traffic_target::{IdentityBindingSubject, TrafficTarget, TrafficTargetRule, TrafficTargetSpec};
