//! SMI `TrafficSplit` (split.smi-spec.io/v1alpha4): routes a root Service's
//! traffic by weight across backend Services for canary rollout (spec.md
//! §3, §4.1 step 4-5).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "split.smi-spec.io",
    version = "v1alpha4",
    kind = "TrafficSplit",
    plural = "trafficsplits",
    shortname = "ts",
    namespaced
)]
#[kube(printcolumn = r#"{"name":"Service", "type":"string", "jsonPath":".spec.service"}"#)]
#[kube(printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#)]
pub struct TrafficSplitSpec {
    pub service: String,
    pub backends: Vec<TrafficSplitBackendSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<RouteRef>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TrafficSplitBackendSpec {
    pub service: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RouteRef {
    pub kind: String,
    pub name: String,
}
