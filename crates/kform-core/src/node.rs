//! Document nodes: one structured resource document and the operations on it
//!
//! A [`Node`] owns its tree. The resource set owns its nodes and a filter gets
//! exclusive access through `&mut Node` (or by taking the `Vec<Node>`), so
//! every holder of a borrow observes the same state. Cloning a node is the
//! explicit deep copy.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};
use crate::meta::{Gvk, ResourceMeta};
use crate::path::{FieldPath, PathElement};

/// Kind of a node in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Mapping,
    Sequence,
    Scalar,
    Null,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Mapping(_) => NodeKind::Mapping,
            Value::Sequence(_) => NodeKind::Sequence,
            Value::Null => NodeKind::Null,
            Value::Tagged(tagged) => NodeKind::of(&tagged.value),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeKind::Scalar,
        }
    }

    /// An empty value of this kind, used when creating missing nodes
    pub fn empty_value(self) -> Value {
        match self {
            NodeKind::Mapping => Value::Mapping(Mapping::new()),
            NodeKind::Sequence => Value::Sequence(Vec::new()),
            NodeKind::Scalar => Value::String(String::new()),
            NodeKind::Null => Value::Null,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Mapping => "mapping",
            NodeKind::Sequence => "sequence",
            NodeKind::Scalar => "scalar",
            NodeKind::Null => "null",
        }
    }
}

/// A structured document (usually one Kubernetes-style resource)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node(Value);

impl Node {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self(serde_yaml::from_str(yaml)?))
    }

    /// Serialize this node as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Convert a typed value into the generic tree form
    pub fn marshal<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_yaml::to_value(value)?))
    }

    /// Convert the generic tree into a typed value
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_yaml::from_value(self.0.clone())?)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn kind_of_node(&self) -> NodeKind {
        NodeKind::of(&self.0)
    }

    // =========================================================================
    // Path navigation
    // =========================================================================

    /// Get the value at a dotted/indexed path. Returns `None` when the path
    /// does not exist or cannot be parsed.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = FieldPath::parse(path).ok()?;
        self.get_path(&path)
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path.elements()
            .iter()
            .try_fold(&self.0, |current, element| match (element, current) {
                (PathElement::Field(name), Value::Mapping(map)) => map.get(name.as_str()),
                (PathElement::Index(i), Value::Sequence(items)) => items.get(*i),
                _ => None,
            })
    }

    pub fn get_path_mut(&mut self, path: &FieldPath) -> Option<&mut Value> {
        let mut current = &mut self.0;
        for element in path.elements() {
            current = step_existing(current, element)?;
        }
        Some(current)
    }

    /// Get the string at a path of plain field names
    pub fn get_str(&self, fields: &[&str]) -> Option<&str> {
        let path = FieldPath::from_fields(fields.iter().copied());
        self.get_path(&path).and_then(Value::as_str)
    }

    /// Set the value at a dotted/indexed path.
    ///
    /// Missing intermediate nodes are created only when `create` is true;
    /// otherwise a [`CoreError::PathNotFound`] is returned.
    pub fn set(&mut self, path: &str, value: Value, create: bool) -> Result<()> {
        let path = FieldPath::parse(path)?;
        self.set_path(&path, value, create)
    }

    pub fn set_path(&mut self, path: &FieldPath, value: Value, create: bool) -> Result<()> {
        let not_found = || CoreError::PathNotFound {
            path: path.to_string(),
        };

        let Some((last, parents)) = path.elements().split_last() else {
            self.0 = value;
            return Ok(());
        };

        let mut current = &mut self.0;
        for (i, element) in parents.iter().enumerate() {
            current = if create {
                let next = container_kind(&path.elements()[i + 1]);
                step_create(current, element, next)?
            } else {
                step_existing(current, element).ok_or_else(not_found)?
            };
        }

        if current.is_null() {
            *current = container_kind(last).empty_value();
        }
        match (last, current) {
            (PathElement::Field(name), Value::Mapping(map)) => {
                map.insert(Value::String(name.clone()), value);
                Ok(())
            }
            (PathElement::Index(i), Value::Sequence(items)) => {
                if *i < items.len() {
                    items[*i] = value;
                    Ok(())
                } else if *i == items.len() {
                    items.push(value);
                    Ok(())
                } else {
                    Err(not_found())
                }
            }
            (last, other) => Err(CoreError::UnexpectedKind {
                expected: container_kind(last).as_str(),
                found: NodeKind::of(other).as_str(),
            }),
        }
    }

    /// Walk `path`, creating every missing node on the way. A missing or null
    /// leaf is created as an empty node of `leaf`.
    pub fn lookup_create(&mut self, path: &FieldPath, leaf: NodeKind) -> Result<&mut Value> {
        let elements = path.elements();
        let mut current = &mut self.0;
        for (i, element) in elements.iter().enumerate() {
            let next = match elements.get(i + 1) {
                Some(next) => container_kind(next),
                None => leaf,
            };
            current = step_create(current, element, next)?;
        }
        if current.is_null() && leaf != NodeKind::Null {
            *current = leaf.empty_value();
        }
        Ok(current)
    }

    /// Remove a top-level field. No-op when the field is absent.
    pub fn clear(&mut self, name: &str) -> Option<Value> {
        match &mut self.0 {
            Value::Mapping(map) => map.remove(name),
            _ => None,
        }
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Snapshot of GVK, name, namespace, labels and annotations
    pub fn get_meta(&self) -> Result<ResourceMeta> {
        let kind = self
            .get_str(&["kind"])
            .ok_or_else(|| CoreError::MissingField {
                field: "kind".to_string(),
            })?;

        Ok(ResourceMeta {
            api_version: self.get_str(&["apiVersion"]).unwrap_or("").to_string(),
            kind: kind.to_string(),
            name: self.get_str(&["metadata", "name"]).unwrap_or("").to_string(),
            namespace: self
                .get_str(&["metadata", "namespace"])
                .filter(|ns| !ns.is_empty())
                .map(String::from),
            labels: string_map(self.get_path(&FieldPath::from_fields(["metadata", "labels"]))),
            annotations: string_map(
                self.get_path(&FieldPath::from_fields(["metadata", "annotations"])),
            ),
        })
    }

    /// Group/version/kind of the document; missing fields read as empty
    pub fn gvk(&self) -> Gvk {
        Gvk::from_api_version(
            self.get_str(&["apiVersion"]).unwrap_or(""),
            self.kind().unwrap_or(""),
        )
    }

    pub fn kind(&self) -> Option<&str> {
        self.get_str(&["kind"])
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(&["metadata", "name"])
    }

    /// `kind/name` used in log lines and errors; never fails
    pub fn id(&self) -> String {
        format!(
            "{}/{}",
            self.kind().unwrap_or("<unknown>"),
            self.name().unwrap_or("<unnamed>")
        )
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let path = FieldPath::from_fields(["metadata", "name"]);
        self.set_path(&path, Value::String(name.to_string()), true)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.get_str(&["metadata", "annotations", key])
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<()> {
        let path = FieldPath::from_fields(["metadata", "annotations"]);
        let annotations = self.lookup_create(&path, NodeKind::Mapping)?;
        set_field(annotations, key, Value::String(value.to_string()))
    }

    /// Remove an annotation, dropping the annotations mapping when it ends up empty
    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        let metadata = match &mut self.0 {
            Value::Mapping(map) => map.get_mut("metadata")?.as_mapping_mut()?,
            _ => return None,
        };
        let annotations = metadata.get_mut("annotations")?.as_mapping_mut()?;
        let removed = annotations.remove(key)?;
        if annotations.is_empty() {
            metadata.remove("annotations");
        }
        scalar_to_string(&removed)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node(value)
    }
}

/// Set `name` on a mapping node. A null node becomes a mapping.
pub fn set_field(target: &mut Value, name: &str, value: Value) -> Result<()> {
    if target.is_null() {
        *target = Value::Mapping(Mapping::new());
    }
    match target {
        Value::Mapping(map) => {
            map.insert(Value::String(name.to_string()), value);
            Ok(())
        }
        other => Err(CoreError::UnexpectedKind {
            expected: NodeKind::Mapping.as_str(),
            found: NodeKind::of(other).as_str(),
        }),
    }
}

/// Remove `name` from a mapping node. No-op on null nodes and absent fields.
pub fn clear_field(target: &mut Value, name: &str) -> Result<Option<Value>> {
    match target {
        Value::Mapping(map) => Ok(map.remove(name)),
        Value::Null => Ok(None),
        other => Err(CoreError::UnexpectedKind {
            expected: NodeKind::Mapping.as_str(),
            found: NodeKind::of(other).as_str(),
        }),
    }
}

/// Render a scalar as a string; `None` for containers and null
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Mapping(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
        .collect()
}

fn container_kind(element: &PathElement) -> NodeKind {
    match element {
        PathElement::Field(_) => NodeKind::Mapping,
        PathElement::Index(_) => NodeKind::Sequence,
    }
}

fn step_existing<'a>(current: &'a mut Value, element: &PathElement) -> Option<&'a mut Value> {
    match (element, current) {
        (PathElement::Field(name), Value::Mapping(map)) => map.get_mut(name.as_str()),
        (PathElement::Index(i), Value::Sequence(items)) => items.get_mut(*i),
        _ => None,
    }
}

fn step_create<'a>(
    current: &'a mut Value,
    element: &PathElement,
    next: NodeKind,
) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = container_kind(element).empty_value();
    }
    match (element, current) {
        (PathElement::Field(name), Value::Mapping(map)) => Ok(map
            .entry(Value::String(name.clone()))
            .or_insert_with(|| next.empty_value())),
        (PathElement::Index(i), Value::Sequence(items)) => {
            if *i == items.len() {
                items.push(next.empty_value());
            }
            let len = items.len();
            items.get_mut(*i).ok_or_else(|| CoreError::PathNotFound {
                path: format!("[{}] (sequence has {} elements)", i, len),
            })
        }
        (element, other) => Err(CoreError::UnexpectedKind {
            expected: container_kind(element).as_str(),
            found: NodeKind::of(other).as_str(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Node {
        Node::from_yaml(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: staging
  labels:
    app: web
spec:
  replicas: 2
  template:
    spec:
      containers:
      - name: nginx
        image: nginx:1.25
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_get_dotted_and_indexed() {
        let node = deployment();
        assert_eq!(node.get("spec.replicas").and_then(Value::as_i64), Some(2));
        assert_eq!(
            node.get("spec.template.spec.containers[0].image").unwrap(),
            "nginx:1.25"
        );
        assert!(node.get("spec.template.spec.containers[1]").is_none());
        assert!(node.get("spec.missing").is_none());
    }

    #[test]
    fn test_set_existing_path() {
        let mut node = deployment();
        node.set("spec.replicas", Value::from(5), false).unwrap();
        assert_eq!(node.get("spec.replicas").and_then(Value::as_i64), Some(5));
    }

    #[test]
    fn test_set_without_create_reports_not_found() {
        let mut node = deployment();
        let err = node
            .set("spec.strategy.type", Value::from("Recreate"), false)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(node.get("spec.strategy").is_none());
    }

    #[test]
    fn test_set_with_create_builds_intermediates() {
        let mut node = deployment();
        node.set("spec.strategy.type", Value::from("Recreate"), true)
            .unwrap();
        assert_eq!(node.get("spec.strategy.type").unwrap(), "Recreate");

        node.set(
            "spec.template.spec.containers[1].name",
            Value::from("sidecar"),
            true,
        )
        .unwrap();
        assert_eq!(
            node.get("spec.template.spec.containers[1].name").unwrap(),
            "sidecar"
        );
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut node = deployment();
        let err = node
            .set("spec.replicas.count", Value::from(1), true)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedKind { .. }));
    }

    #[test]
    fn test_clear_is_noop_when_absent() {
        let mut node = deployment();
        assert!(node.clear("status").is_none());
        assert!(node.clear("spec").is_some());
        assert!(node.get("spec").is_none());
    }

    #[test]
    fn test_get_meta() {
        let meta = deployment().get_meta().unwrap();
        assert_eq!(meta.kind, "Deployment");
        assert_eq!(meta.name, "web");
        assert_eq!(meta.namespace.as_deref(), Some("staging"));
        assert_eq!(meta.label("app"), "web");
        assert_eq!(meta.gvk().group, "apps");
    }

    #[test]
    fn test_get_meta_requires_kind() {
        let node = Node::from_yaml("metadata:\n  name: foo\n").unwrap();
        assert!(matches!(
            node.get_meta(),
            Err(CoreError::MissingField { .. })
        ));
    }

    #[test]
    fn test_annotations_roundtrip() {
        let mut node = deployment();
        node.set_annotation("config.kubernetes.io/path", "apps/web.yaml")
            .unwrap();
        assert_eq!(
            node.annotation("config.kubernetes.io/path"),
            Some("apps/web.yaml")
        );

        assert_eq!(
            node.remove_annotation("config.kubernetes.io/path").as_deref(),
            Some("apps/web.yaml")
        );
        assert!(node.get("metadata.annotations").is_none());
    }

    #[test]
    fn test_clone_is_a_deep_copy() {
        let original = deployment();
        let mut copy = original.clone();
        copy.set("metadata.name", Value::from("other"), false)
            .unwrap();
        assert_eq!(original.name(), Some("web"));
        assert_eq!(copy.name(), Some("other"));
    }

    #[test]
    fn test_lookup_create_replaces_null_leaf() {
        let mut node = Node::from_yaml("metadata:\n  labels: ~\n").unwrap();
        let labels = node
            .lookup_create(&FieldPath::from_fields(["metadata", "labels"]), NodeKind::Mapping)
            .unwrap();
        assert!(labels.is_mapping());
    }

    #[test]
    fn test_unmarshal_typed() {
        #[derive(serde::Deserialize)]
        struct Spec {
            replicas: u32,
        }
        let node = Node::new(deployment().get("spec").unwrap().clone());
        let spec: Spec = node.unmarshal().unwrap();
        assert_eq!(spec.replicas, 2);
    }
}
