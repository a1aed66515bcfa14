//! CRD Generator - Generates Kubernetes CRD YAML from Rust types

use kube::CustomResourceExt;
use mesh_controller::crd::{HttpRouteGroup, TcpRoute, TrafficSplit, TrafficTarget};

fn main() {
    let traffic_target_crd = TrafficTarget::crd();
    println!("---");
    println!("# TrafficTarget CRD");
    println!("{}", serde_yaml::to_string(&traffic_target_crd).unwrap());

    let http_route_group_crd = HttpRouteGroup::crd();
    println!("---");
    println!("# HTTPRouteGroup CRD");
    println!("{}", serde_yaml::to_string(&http_route_group_crd).unwrap());

    let tcp_route_crd = TcpRoute::crd();
    println!("---");
    println!("# TCPRoute CRD");
    println!("{}", serde_yaml::to_string(&tcp_route_crd).unwrap());

    let traffic_split_crd = TrafficSplit::crd();
    println!("---");
    println!("# TrafficSplit CRD");
    println!("{}", serde_yaml::to_string(&traffic_split_crd).unwrap());
}
