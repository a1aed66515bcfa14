//! Integration tests for shadow-service reconciliation (spec.md §4.4)
//! against a live cluster, in the teacher's `#[ignore]`-unless-a-cluster-
//! is-reachable style (`operator/tests/site_lifecycle_test.rs`).

use k8s_openapi::api::core::v1::Service;
use kube::{api::Api, Client, ResourceExt};
use mesh_core::key::Key;
use mesh_core::model::{Protocol, Service as MeshService, ServicePort, TargetPort, Topology};
use mesh_core::ports::PortTable;
use mesh_core::provider::{Config as ProviderConfig, TrafficType};

const TEST_MESH_NAMESPACE: &str = "test-traefik-mesh";

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        acl: false,
        default_traffic_type: TrafficType::Http,
        min_http_port: 15000,
        max_http_port: 15100,
        mesh_namespace: TEST_MESH_NAMESPACE.to_string(),
    }
}

fn demo_topology() -> (Topology, PortTable) {
    let key = Key::new("demo", "apps");
    let mut topology = Topology::default();
    topology.services.insert(
        key.clone(),
        MeshService {
            ports: vec![ServicePort {
                name: None,
                port: 80,
                target_port: TargetPort::Number(8080),
                protocol: Protocol::Tcp,
            }],
            cluster_ip: Some("10.96.0.10".to_string()),
            ..MeshService::new(key.clone())
        },
    );

    let mut ports = PortTable::new(15000, 15100, (16000, 16100), (17000, 17100));
    let svc_ref = mesh_core::ports::ServicePortRef { service: key, port: 80 };
    ports.http_port(svc_ref, 0).unwrap();

    (topology, ports)
}

#[tokio::test]
#[ignore] // Requires a reachable Kubernetes cluster with the SMI CRDs installed
async fn test_shadow_service_created_for_mesh_service() {
    let client = Client::try_default().await.expect("Failed to create client");

    // Make sure the mesh namespace exists (ignore if it already does).
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());
    let ns = k8s_openapi::api::core::v1::Namespace {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(TEST_MESH_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let _ = namespaces
        .create(&kube::api::PostParams::default(), &ns)
        .await;

    let (topology, ports) = demo_topology();
    let config = provider_config();

    shadow_impl::reconcile(&client, &topology, &ports, &config, TEST_MESH_NAMESPACE)
        .await
        .expect("shadow reconciliation failed");

    let services: Api<Service> = Api::namespaced(client.clone(), TEST_MESH_NAMESPACE);
    let shadow = services
        .get("demo-apps")
        .await
        .expect("expected shadow service demo-apps to exist");
    assert_eq!(shadow.name_any(), "demo-apps");
    assert_eq!(
        shadow
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get("mesh.traefik.io/shadow-of"))
            .map(String::as_str),
        Some("demo.apps")
    );

    // Cleanup.
    let _ = services
        .delete("demo-apps", &kube::api::DeleteParams::default())
        .await;
}

#[tokio::test]
#[ignore] // Requires a reachable Kubernetes cluster
async fn test_shadow_service_pruned_when_origin_vanishes() {
    let client = Client::try_default().await.expect("Failed to create client");
    let (topology, ports) = demo_topology();
    let config = provider_config();

    shadow_impl::reconcile(&client, &topology, &ports, &config, TEST_MESH_NAMESPACE)
        .await
        .expect("initial reconcile failed");

    let empty_topology = Topology::default();
    shadow_impl::reconcile(&client, &empty_topology, &ports, &config, TEST_MESH_NAMESPACE)
        .await
        .expect("prune reconcile failed");

    let services: Api<Service> = Api::namespaced(client, TEST_MESH_NAMESPACE);
    assert!(services.get("demo-apps").await.is_err(), "orphaned shadow service should have been pruned");
}

// `tests/` is a separate crate from the `traefik-mesh` binary, so
// `shadow::reconcile` isn't directly reachable; the binary-private modules
// aren't part of the library surface (only `crd` is, see `src/lib.rs`).
// Re-include the source file the same way `publish_and_health_test.rs`
// re-includes `api.rs`/`health.rs`, so this test exercises the exact same
// code the daemon runs.
#[path = "../src/error.rs"]
mod error;
#[path = "../src/shadow.rs"]
mod shadow_impl;
