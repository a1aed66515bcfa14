//! SMI `TCPRoute` (specs.smi-spec.io/v1alpha4): a marker spec referenced by
//! `TrafficTarget.rules` for TCP traffic. SMI leaves its matching semantics
//! undefined beyond "this TrafficTarget also covers TCP" (spec.md §3, §9).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "specs.smi-spec.io",
    version = "v1alpha4",
    kind = "TCPRoute",
    root = "TcpRoute",
    plural = "tcproutes",
    shortname = "tcr",
    namespaced
)]
#[kube(printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#)]
pub struct TcpRouteSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<u16>,
}
