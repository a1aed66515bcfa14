//! Shadow-service reconciler (spec.md §4.4): for every user Service the
//! core exposes, maintain a matching Service in the mesh namespace whose
//! ports are the allocated proxy entrypoints and whose selector targets the
//! proxy DaemonSet. Grounded on `operator/src/controllers/site.rs`'s
//! create-or-update pattern, generalized from a stubbed external API call
//! to a real Kubernetes object and server-side apply, which gives the
//! idempotent/concurrent-writer tolerance spec.md asks for without having
//! to hand-roll 409 retry logic.

use crate::error::ControllerError;
use k8s_openapi::api::core::v1::{Service, ServicePort as K8sServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    Client, ResourceExt,
};
use mesh_core::model::Topology;
use mesh_core::ports::{PortProtocol, PortTable, ServicePortRef};
use mesh_core::provider::{self, Config as ProviderConfig, TrafficType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

const FIELD_MANAGER: &str = "traefik-mesh";
const PROXY_SELECTOR_KEY: &str = "app";
const PROXY_SELECTOR_VALUE: &str = "traefik-mesh-proxy";
const ORIGIN_ANNOTATION: &str = "mesh.traefik.io/shadow-of";

/// Deterministic shadow-service name for a user `(namespace, service)` pair.
pub fn shadow_name(service_name: &str, namespace: &str) -> String {
    format!("{service_name}-{namespace}")
}

#[tracing::instrument(skip(client, topology, ports, provider_config))]
pub async fn reconcile(
    client: &Client,
    topology: &Topology,
    ports: &PortTable,
    provider_config: &ProviderConfig,
    mesh_namespace: &str,
) -> Result<(), ControllerError> {
    let api: Api<Service> = Api::namespaced(client.clone(), mesh_namespace);
    let mut live_names = BTreeSet::new();

    for service in topology.services.values() {
        let name = shadow_name(&service.key.name, &service.key.namespace);
        live_names.insert(name.clone());

        let traffic_type = service
            .annotations
            .get(provider::annotation::TRAFFIC_TYPE)
            .and_then(|v| TrafficType::parse(v))
            .unwrap_or(provider_config.default_traffic_type);
        let protocol = match traffic_type {
            TrafficType::Http => PortProtocol::Http,
            TrafficType::Tcp => PortProtocol::Tcp,
            TrafficType::Udp => PortProtocol::Udp,
        };

        let ports_spec: Vec<K8sServicePort> = service
            .ports
            .iter()
            .filter_map(|sp| {
                let svc_ref = ServicePortRef {
                    service: service.key.clone(),
                    port: sp.port,
                };
                let mesh_port = ports.lookup(&svc_ref, protocol)?;
                Some(K8sServicePort {
                    name: sp.name.clone(),
                    port: sp.port as i32,
                    target_port: Some(k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(
                        mesh_port as i32,
                    )),
                    protocol: Some(match sp.protocol {
                        mesh_core::model::Protocol::Udp => "UDP".to_string(),
                        mesh_core::model::Protocol::Tcp => "TCP".to_string(),
                    }),
                    ..Default::default()
                })
            })
            .collect();

        if ports_spec.is_empty() {
            debug!(service = %service.key, "no allocated ports yet, skipping shadow service");
            continue;
        }

        let mut selector = BTreeMap::new();
        selector.insert(PROXY_SELECTOR_KEY.to_string(), PROXY_SELECTOR_VALUE.to_string());

        let mut annotations = BTreeMap::new();
        annotations.insert(ORIGIN_ANNOTATION.to_string(), service.key.to_string());

        let shadow = Service {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(mesh_namespace.to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(selector),
                ports: Some(ports_spec),
                ..Default::default()
            }),
            ..Default::default()
        };

        let patch = Patch::Apply(&shadow);
        let pp = PatchParams::apply(FIELD_MANAGER).force();
        if let Err(e) = api.patch(&name, &pp, &patch).await {
            warn!(service = %service.key, error = %e, "failed to apply shadow service");
            return Err(ControllerError::ShadowService {
                service: service.key.to_string(),
                reason: e.to_string(),
            });
        }
    }

    prune_orphans(&api, &live_names).await
}

/// Delete shadow Services whose origin Service vanished from the Topology
/// (spec.md §4.4: "Deletes shadow Services whose origins vanished").
async fn prune_orphans(api: &Api<Service>, live_names: &BTreeSet<String>) -> Result<(), ControllerError> {
    let existing = api.list(&ListParams::default()).await?;
    for svc in existing.items {
        let name = svc.name_any();
        let is_shadow = svc
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|a| a.contains_key(ORIGIN_ANNOTATION));
        if is_shadow && !live_names.contains(&name) {
            info!(service = %name, "deleting orphaned shadow service");
            api.delete(&name, &Default::default()).await?;
        }
    }
    Ok(())
}
