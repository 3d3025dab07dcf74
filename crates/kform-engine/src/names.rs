//! Name prefix/suffix and the references that follow renamed resources

use std::collections::BTreeMap;
use std::sync::Arc;

use kform_core::{Filter, Node, NodeKind};
use serde_yaml::Value;

use crate::fieldspecs::FieldSpecTables;

/// Names a resource had before each rename, innermost first, comma separated
pub const ORIGINAL_NAME_ANNOTATION: &str = "kustomize.io/original-name";
/// Kustomizations that renamed the resource, paired with the original names
pub const RENAMED_BY_ANNOTATION: &str = "kustomize.io/renamed-by";

/// Rename layers stamped on a resource, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RenameHistory {
    /// (kustomization, name before its rename)
    layers: Vec<(String, String)>,
}

impl RenameHistory {
    fn read(node: &Node) -> Self {
        let (Some(names), Some(owners)) = (
            node.annotation(ORIGINAL_NAME_ANNOTATION),
            node.annotation(RENAMED_BY_ANNOTATION),
        ) else {
            return Self::default();
        };
        let names: Vec<&str> = names.split(',').collect();
        let owners: Vec<&str> = owners.split(',').collect();
        if names.len() != owners.len() {
            tracing::warn!(
                resource = %node.id(),
                "rename annotations disagree, ignoring them"
            );
            return Self::default();
        }
        Self {
            layers: owners
                .into_iter()
                .zip(names)
                .map(|(owner, name)| (owner.to_string(), name.to_string()))
                .collect(),
        }
    }

    fn write(&self, node: &mut Node) -> kform_core::Result<()> {
        if self.layers.is_empty() {
            node.remove_annotation(ORIGINAL_NAME_ANNOTATION);
            node.remove_annotation(RENAMED_BY_ANNOTATION);
            return Ok(());
        }
        let (owners, names): (Vec<&str>, Vec<&str>) = self
            .layers
            .iter()
            .map(|(owner, name)| (owner.as_str(), name.as_str()))
            .unzip();
        node.set_annotation(ORIGINAL_NAME_ANNOTATION, &names.join(","))?;
        node.set_annotation(RENAMED_BY_ANNOTATION, &owners.join(","))?;
        Ok(())
    }

    /// Drop the newest layer of `kustomization` and every layer above it,
    /// returning the name from before that layer
    fn unwind(&mut self, kustomization: &str) -> Option<String> {
        let position = self
            .layers
            .iter()
            .rposition(|(owner, _)| owner == kustomization)?;
        let (_, name) = self.layers[position].clone();
        self.layers.truncate(position);
        Some(name)
    }
}

/// A resource name qualified by its kind
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameKey {
    pub kind: String,
    pub name: String,
}

/// Adds a prefix and a suffix to every resource name
#[derive(Debug, Clone)]
pub struct SetNameFilter {
    pub prefix: String,
    pub suffix: String,
    /// Name of the owning kustomization, stamped on renamed resources
    pub kustomization: String,
    tables: Arc<FieldSpecTables>,
    mappings: BTreeMap<NameKey, String>,
}

impl SetNameFilter {
    pub fn new(
        tables: Arc<FieldSpecTables>,
        kustomization: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            kustomization: kustomization.into(),
            tables,
            mappings: BTreeMap::new(),
        }
    }

    /// Old name to new name of every resource renamed by the last run
    pub fn mappings(&self) -> &BTreeMap<NameKey, String> {
        &self.mappings
    }
}

impl Filter for SetNameFilter {
    fn filter(&mut self, mut nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        self.mappings.clear();
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return Ok(nodes);
        }

        for node in &mut nodes {
            let meta = node.get_meta()?;
            if meta.name.is_empty() {
                continue;
            }
            let new_name = format!("{}{}{}", self.prefix, meta.name, self.suffix);
            let mut history = RenameHistory::read(node);
            history
                .layers
                .push((self.kustomization.clone(), meta.name.clone()));
            node.set_name(&new_name)?;
            history.write(node)?;
            tracing::debug!("renamed {} to {}", meta.id(), new_name);
            self.mappings.insert(
                NameKey {
                    kind: meta.kind,
                    name: meta.name,
                },
                new_name,
            );
        }

        rewrite_references(&mut nodes, &self.tables, &self.mappings)?;
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "setname"
    }
}

/// Restores names set by an earlier run of the same kustomization, undoing
/// every rename layered on top of it
#[derive(Debug, Clone)]
pub struct ResetNameFilter {
    pub kustomization: String,
    tables: Arc<FieldSpecTables>,
}

impl ResetNameFilter {
    pub fn new(tables: Arc<FieldSpecTables>, kustomization: impl Into<String>) -> Self {
        Self {
            kustomization: kustomization.into(),
            tables,
        }
    }
}

impl Filter for ResetNameFilter {
    fn filter(&mut self, mut nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        let mut restored = BTreeMap::new();
        for node in &mut nodes {
            let mut history = RenameHistory::read(node);
            let Some(original) = history.unwind(&self.kustomization) else {
                continue;
            };
            let meta = node.get_meta()?;
            node.set_name(&original)?;
            history.write(node)?;
            restored.insert(
                NameKey {
                    kind: meta.kind,
                    name: meta.name,
                },
                original,
            );
        }

        if !restored.is_empty() {
            tracing::debug!("restored {} names", restored.len());
            rewrite_references(&mut nodes, &self.tables, &restored)?;
        }
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "reset"
    }
}

/// Point every reference to a renamed resource at its new name
fn rewrite_references(
    nodes: &mut [Node],
    tables: &FieldSpecTables,
    renames: &BTreeMap<NameKey, String>,
) -> kform_core::Result<()> {
    for (key, new_name) in renames {
        for specs in tables.references_to(&key.kind) {
            for node in nodes.iter_mut() {
                specs.apply(node, NodeKind::Scalar, |field| {
                    if field.as_str() == Some(key.name.as_str()) {
                        *field = Value::String(new_name.clone());
                    }
                    Ok(())
                })?;
            }
        }
    }
    Ok(())
}
