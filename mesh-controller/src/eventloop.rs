//! Event loop & debouncer (spec.md §4.5): a single cooperative worker that
//! turns a stream of "something changed" notifications into debounced,
//! serialized rebuilds. Grounded on `operator/src/controllers/site.rs`'s
//! `Controller::new(...).run(reconcile, error_policy, context)` shape, but
//! restructured away from per-object reconciliation: spec.md explicitly
//! wants "one work queue + one worker + timers" rather than a reconcile
//! callback per changed object, since a single Service change can require
//! re-rendering the whole `DynamicConfig` (TrafficSplit backends, shared
//! entrypoints). Watchers here are pure enqueues, same role as the
//! teacher's watch callbacks — the only true parallelism is the `kube`
//! client's own connection handling.

use crate::api::PublishedConfig;
use mesh_controller::crd::{HttpRouteGroup, TcpRoute, TrafficSplit, TrafficTarget};
use crate::error::ControllerError;
use crate::health::HealthStatus;
use crate::listers;
use crate::metrics::Metrics;
use crate::porttable_store::PortTableStore;
use crate::shadow;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use mesh_core::filter::ResourceFilter;
use mesh_core::ports::ServicePortRef;
use mesh_core::provider::Config as ProviderConfig;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Coalescing window: arms on the first event after an idle period, then
/// collects any further events that land before it fires (spec.md §4.5:
/// "debounce ≈ 100 ms, coalescing bursts").
const DEBOUNCE: Duration = Duration::from_millis(100);

pub struct EventLoop {
    pub client: Client,
    pub filter: ResourceFilter,
    pub provider_config: ProviderConfig,
    pub mesh_namespace: String,
    pub port_store: PortTableStore,
    pub published: PublishedConfig,
    pub health: HealthStatus,
}

impl EventLoop {
    /// Runs forever. A top-level cancellation signal (`shutdown`) drains the
    /// watch tasks and returns once the in-flight rebuild, if any, finishes
    /// (spec.md §5 "Cancellation").
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let watch_tasks = spawn_watchers(self.client.clone(), tx);

        let tcp_range = (10000u16, 19999u16);
        let udp_range = (20000u16, 29999u16);
        let mut ports = self
            .port_store
            .load_or_init(
                self.provider_config.min_http_port,
                self.provider_config.max_http_port,
                tcp_range,
                udp_range,
            )
            .await;

        info!("event loop started, waiting for first change notification");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown requested, draining event loop");
                        break;
                    }
                }
                signal = rx.recv() => {
                    if signal.is_none() {
                        warn!("all watchers stopped, exiting event loop");
                        break;
                    }
                    tokio::time::sleep(DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}

                    let started = Instant::now();
                    match self.rebuild(&mut ports).await {
                        Ok(()) => {
                            self.health.set_ready(true);
                            Metrics::global().record_rebuild_success(started.elapsed().as_secs_f64());
                        }
                        Err(e) => {
                            error!(error = %e, "rebuild failed");
                            Metrics::global().record_rebuild_error(error_reason(&e));
                        }
                    }
                }
            }
        }

        for task in watch_tasks {
            task.abort();
        }
    }

    #[tracing::instrument(skip(self, ports))]
    async fn rebuild(&self, ports: &mut mesh_core::PortTable) -> Result<(), ControllerError> {
        let snapshot = listers::fetch_snapshot(&self.client).await?;
        let topology = mesh_core::build(&snapshot, &self.filter)?;

        for err in &topology.errors {
            warn!(error = %err, "topology build recorded entity error");
            Metrics::global().record_entity_error(entity_error_kind(err));
        }
        Metrics::global().set_topology_size("services", topology.services.len() as i64);
        Metrics::global().set_topology_size("pods", topology.pods.len() as i64);
        Metrics::global().set_topology_size("traffic_splits", topology.traffic_splits.len() as i64);

        let live: BTreeSet<ServicePortRef> = topology
            .services
            .values()
            .flat_map(|svc| {
                svc.ports.iter().map(|sp| ServicePortRef {
                    service: svc.key.clone(),
                    port: sp.port,
                })
            })
            .collect();
        ports.reclaim(&live);

        let (cfg, issues) = mesh_core::provide(&topology, &self.provider_config, ports);
        for issue in &issues {
            warn!(?issue, "configuration provider issue");
        }

        self.port_store.save(ports).await?;
        self.published.set(cfg).await;

        shadow::reconcile(&self.client, &topology, ports, &self.provider_config, &self.mesh_namespace).await?;

        Ok(())
    }
}

fn entity_error_kind(err: &mesh_core::EntityError) -> &'static str {
    use mesh_core::EntityError::*;
    match err {
        UnknownTrafficType { .. } => "unknown_traffic_type",
        UnknownScheme { .. } => "unknown_scheme",
        InvalidAnnotation { .. } => "invalid_annotation",
        PortMismatch { .. } => "port_mismatch",
        UnknownHttpMatch { .. } => "unknown_http_match",
        CircularTrafficSplit { .. } => "circular_traffic_split",
        BackendPortMissing { .. } => "backend_port_missing",
        UnknownServiceAccount { .. } => "unknown_service_account",
        MissingDestinationPods { .. } => "missing_destination_pods",
    }
}

fn error_reason(e: &ControllerError) -> &'static str {
    match e {
        ControllerError::Kube(_) => "kube",
        ControllerError::Serialization(_) => "serialization",
        ControllerError::SnapshotUnavailable(_) => "snapshot_unavailable",
        ControllerError::PublishFailed(_) => "publish_failed",
        ControllerError::ShadowService { .. } => "shadow_service",
        ControllerError::PortTableStore(_) => "port_table_store",
    }
}

/// One watcher task per watched kind (spec.md §6 "Inbound"), each a pure
/// enqueue into the shared dirty-signal channel. The `kube::runtime`
/// `watcher` stream already handles relist-on-error/backoff; we only care
/// about "something changed", never the event payload itself.
fn spawn_watchers(client: Client, tx: mpsc::Sender<()>) -> Vec<tokio::task::JoinHandle<()>> {
    fn forward<K>(api: Api<K>, tx: mpsc::Sender<()>) -> tokio::task::JoinHandle<()>
    where
        K: kube::Resource + Clone + std::fmt::Debug + Send + Sync + 'static,
        K: serde::de::DeserializeOwned,
        K::DynamicType: Default + Eq + std::hash::Hash + Clone,
    {
        tokio::spawn(async move {
            let mut stream = watcher(api, watcher::Config::default())
                .default_backoff()
                .applied_objects()
                .boxed();
            while let Some(event) = stream.next().await {
                if event.is_err() {
                    continue;
                }
                let _ = tx.try_send(());
            }
        })
    }

    vec![
        forward(Api::<Service>::all(client.clone()), tx.clone()),
        forward(Api::<Endpoints>::all(client.clone()), tx.clone()),
        forward(Api::<Pod>::all(client.clone()), tx.clone()),
        forward(Api::<TrafficTarget>::all(client.clone()), tx.clone()),
        forward(Api::<HttpRouteGroup>::all(client.clone()), tx.clone()),
        forward(Api::<TcpRoute>::all(client.clone()), tx.clone()),
        forward(Api::<TrafficSplit>::all(client.clone()), tx),
    ]
}
