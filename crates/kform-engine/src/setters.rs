//! Filters that set labels, annotations, selectors and namespaces at every
//! location the field spec tables name

use std::sync::Arc;

use indexmap::IndexMap;
use kform_core::node::{clear_field, set_field};
use kform_core::{FieldSpecList, Filter, Node, NodeKind};
use serde_yaml::Value;

use crate::fieldspecs::FieldSpecTables;

/// Sets (or with `None` removes) keys of a string map field
#[derive(Debug, Clone)]
pub struct FieldMapFilter {
    name: &'static str,
    pub values: IndexMap<String, Option<String>>,
    specs: Arc<FieldSpecList>,
}

impl FieldMapFilter {
    pub fn new(
        name: &'static str,
        specs: Arc<FieldSpecList>,
        values: IndexMap<String, Option<String>>,
    ) -> Self {
        Self {
            name,
            values,
            specs,
        }
    }

    pub fn labels(tables: &FieldSpecTables, values: IndexMap<String, Option<String>>) -> Self {
        Self::new("labels", Arc::clone(&tables.labels), values)
    }

    pub fn annotations(tables: &FieldSpecTables, values: IndexMap<String, Option<String>>) -> Self {
        Self::new("annotations", Arc::clone(&tables.annotations), values)
    }

    pub fn selectors(tables: &FieldSpecTables, values: IndexMap<String, Option<String>>) -> Self {
        Self::new("selectors", Arc::clone(&tables.selectors), values)
    }

    fn apply(&self, node: &mut Node) -> kform_core::Result<()> {
        for (key, value) in &self.values {
            self.specs.apply(node, NodeKind::Mapping, |field| match value {
                Some(value) => set_field(field, key, Value::String(value.clone())),
                None => clear_field(field, key).map(|_| ()),
            })?;
        }
        Ok(())
    }
}

impl Filter for FieldMapFilter {
    fn filter(&mut self, mut nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        if self.values.is_empty() {
            return Ok(nodes);
        }
        for node in &mut nodes {
            self.apply(node)?;
        }
        tracing::debug!("set {} {} on {} resources", self.values.len(), self.name, nodes.len());
        Ok(nodes)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Sets the namespace of every resource
#[derive(Debug, Clone)]
pub struct NamespaceFilter {
    pub namespace: String,
    specs: Arc<FieldSpecList>,
}

impl NamespaceFilter {
    pub fn new(tables: &FieldSpecTables, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            specs: Arc::clone(&tables.namespace),
        }
    }
}

impl Filter for NamespaceFilter {
    fn filter(&mut self, mut nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        if self.namespace.is_empty() {
            return Ok(nodes);
        }
        for node in &mut nodes {
            self.specs.apply(node, NodeKind::Scalar, |field| {
                *field = Value::String(self.namespace.clone());
                Ok(())
            })?;
        }
        tracing::debug!("set namespace {} on {} resources", self.namespace, nodes.len());
        Ok(nodes)
    }

    fn name(&self) -> &str {
        "namespace"
    }
}
