//! SMI `TrafficTarget` (access.smi-spec.io/v1alpha3): grants a set of source
//! ServiceAccounts access to a destination ServiceAccount, optionally scoped
//! to a port and a set of specs (spec.md §3, §6).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "access.smi-spec.io",
    version = "v1alpha3",
    kind = "TrafficTarget",
    plural = "traffictargets",
    shortname = "tt",
    namespaced
)]
#[kube(printcolumn = r#"{"name":"Destination", "type":"string", "jsonPath":".spec.destination.name"}"#)]
#[kube(printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#)]
pub struct TrafficTargetSpec {
    pub destination: IdentityBindingSubject,
    pub sources: Vec<IdentityBindingSubject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<TrafficTargetRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct IdentityBindingSubject {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TrafficTargetRule {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
}
