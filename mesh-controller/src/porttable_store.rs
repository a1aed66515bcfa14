//! Persists the `PortTable` across restarts (spec.md §9: "PortTable and the
//! last-published `DynamicConfig` are the only long-lived mutable state ...
//! PortTable ... serialized/restored on restart (PortTable to a ConfigMap
//! or file, config regenerated from scratch)"). Grounded on the same
//! `Patch::Apply`/fetch idiom as `shadow.rs`; the `DynamicConfig` half of
//! that sentence needs no extra code because it's cheap to regenerate from
//! scratch on the next rebuild, exactly as the design note allows.

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use mesh_core::ports::PortTable;
use std::collections::BTreeMap;
use tracing::{info, warn};

const FIELD_MANAGER: &str = "traefik-mesh";
const DATA_KEY: &str = "port-table.json";

pub struct PortTableStore {
    api: Api<ConfigMap>,
    name: String,
}

impl PortTableStore {
    pub fn new(client: Client, namespace: &str, name: impl Into<String>) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            name: name.into(),
        }
    }

    /// Load the last-persisted table, or build a fresh one if none exists
    /// yet (first boot) or the stored state cannot be parsed (corrupt
    /// ConfigMap, to be rebuilt from scratch rather than block startup).
    pub async fn load_or_init(
        &self,
        min_http_port: u16,
        max_http_port: u16,
        tcp_range: (u16, u16),
        udp_range: (u16, u16),
    ) -> PortTable {
        match self.api.get(&self.name).await {
            Ok(cm) => match cm.data.as_ref().and_then(|d| d.get(DATA_KEY)) {
                Some(raw) => match serde_json::from_str(raw) {
                    Ok(table) => {
                        info!(configmap = %self.name, "restored port table from previous run");
                        return table;
                    }
                    Err(e) => warn!(error = %e, "stored port table is corrupt, starting fresh"),
                },
                None => warn!(configmap = %self.name, "port table configmap has no data key, starting fresh"),
            },
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!(configmap = %self.name, "no prior port table, starting fresh");
            }
            Err(e) => warn!(error = %e, "failed to fetch port table configmap, starting fresh"),
        }
        PortTable::new(min_http_port, max_http_port, tcp_range, udp_range)
    }

    pub async fn save(&self, table: &PortTable) -> Result<(), crate::error::ControllerError> {
        let serialized = serde_json::to_string(table)?;
        let mut data = BTreeMap::new();
        data.insert(DATA_KEY.to_string(), serialized);

        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };

        let pp = PatchParams::apply(FIELD_MANAGER).force();
        self.api.patch(&self.name, &pp, &Patch::Apply(&cm)).await?;
        Ok(())
    }
}
