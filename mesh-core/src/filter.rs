//! `ResourceFilter`: namespaces/labels the Topology Builder ignores
//! entirely (spec §4.1: "Input: snapshot + `ResourceFilter`").

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub ignored_namespaces: Vec<String>,
    /// A resource matching every key/value pair here is ignored.
    pub ignored_labels: BTreeMap<String, String>,
}

impl ResourceFilter {
    pub fn new(ignored_namespaces: Vec<String>, ignored_labels: BTreeMap<String, String>) -> Self {
        Self {
            ignored_namespaces,
            ignored_labels,
        }
    }

    pub fn ignores_namespace(&self, namespace: &str) -> bool {
        self.ignored_namespaces.iter().any(|ns| ns == namespace)
    }

    pub fn ignores_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        !self.ignored_labels.is_empty()
            && self
                .ignored_labels
                .iter()
                .all(|(k, v)| labels.get(k) == Some(v))
    }
}
