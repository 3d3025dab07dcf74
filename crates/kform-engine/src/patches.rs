//! Targeted strategic-merge patches

use std::collections::BTreeMap;

use kform_core::{Filter, Node, ResourceMeta, merge_patch};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Which resources a patch applies to. Every non-empty field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Target {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub label_selector: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub label_prefix: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotation_selector: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotation_prefix: BTreeMap<String, String>,
}

impl Target {
    pub fn matches(&self, meta: &ResourceMeta) -> bool {
        let field = |want: &str, have: &str| want.is_empty() || want == have;

        field(&self.name, &meta.name)
            && field(&self.kind, &meta.kind)
            && field(&self.api_version, &meta.api_version)
            && field(&self.namespace, meta.namespace.as_deref().unwrap_or(""))
            && self
                .annotation_selector
                .iter()
                .all(|(k, v)| meta.annotation(k) == v.as_str())
            && self
                .annotation_prefix
                .iter()
                .all(|(k, v)| meta.annotation(k).starts_with(v.as_str()))
            && self.label_selector.iter().all(|(k, v)| meta.label(k) == v.as_str())
            && self
                .label_prefix
                .iter()
                .all(|(k, v)| meta.label(k).starts_with(v.as_str()))
    }
}

/// A patch fragment and the resources it targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    pub patch: Value,
    #[serde(default)]
    pub target: Target,
}

/// Merges each patch, in declared order, into every resource its target matches
#[derive(Debug, Clone, Default)]
pub struct PatchFilter {
    pub patches: Vec<Patch>,
}

impl PatchFilter {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }
}

impl Filter for PatchFilter {
    fn filter(&mut self, mut nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        for node in &mut nodes {
            for patch in &self.patches {
                let meta = node.get_meta()?;
                if !patch.target.matches(&meta) {
                    continue;
                }
                tracing::debug!("patching {}", meta.id());
                merge_patch(node, &patch.patch)?;
            }
        }
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "patch"
    }
}
