//! Field specs: declarative descriptions of where a concern (labels,
//! annotations, selectors, namespace) lives inside a resource.
//!
//! A spec without group/version/kind is a duck-typed default and applies to
//! every resource. A spec naming any of them is kind-specific. Resolution is
//! two-pass: kind-specific specs matching the resource win, then defaults are
//! added unless a kind-specific match already covers the same path.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{CoreError, Result};
use crate::meta::Gvk;
use crate::node::{Node, NodeKind};
use crate::path::{FieldPath, PathElement};

/// One segment of a field spec path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    /// Every element of the sequence reached so far (`name[]`)
    Each,
}

/// Where a field lives and whether it may be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// `/`-separated path, e.g. `spec/template/metadata/labels`
    pub path: String,
    #[serde(default)]
    pub create: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl FieldSpec {
    pub fn new(path: impl Into<String>, create: bool) -> Self {
        Self {
            path: path.into(),
            create,
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Whether this spec names any of group, version or kind
    pub fn is_kind_specific(&self) -> bool {
        self.group.is_some() || self.version.is_some() || self.kind.is_some()
    }

    /// Each of group/version/kind must be equal when specified
    pub fn matches(&self, gvk: &Gvk) -> bool {
        let check = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);
        check(&self.group, &gvk.group)
            && check(&self.version, &gvk.version)
            && check(&self.kind, &gvk.kind)
    }

    /// Split the path into segments
    pub fn segments(&self) -> Result<Vec<Segment>> {
        let invalid = |message: &str| CoreError::InvalidFieldSpec {
            path: self.path.clone(),
            message: message.to_string(),
        };

        if self.path.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        for part in self.path.split('/') {
            let (name, each) = match part.strip_suffix("[]") {
                Some(name) => (name, true),
                None => (part, false),
            };
            if name.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if name.contains('[') || name.contains(']') {
                return Err(invalid("only a trailing '[]' is allowed in a segment"));
            }
            segments.push(Segment::Field(name.to_string()));
            if each {
                segments.push(Segment::Each);
            }
        }
        Ok(segments)
    }
}

/// A concrete location produced by resolving a field spec against a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: FieldPath,
    /// Whether missing nodes along the path may be created
    pub create: bool,
}

/// Ordered list of field specs for one concern
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpecList {
    #[serde(default)]
    pub items: Vec<FieldSpec>,
}

impl FieldSpecList {
    pub fn new(items: Vec<FieldSpec>) -> Self {
        Self { items }
    }

    /// Parse a list from YAML (`items:` sequence) and validate every path
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let list: FieldSpecList = serde_yaml::from_str(yaml)?;
        for spec in &list.items {
            spec.segments()?;
        }
        Ok(list)
    }

    /// Specs that apply to a resource of the given kind, in declaration order.
    ///
    /// Pass 1 keeps kind-specific specs matching `gvk`. Pass 2 keeps defaults
    /// whose path is not already covered by a pass-1 match.
    pub fn matching(&self, gvk: &Gvk) -> Vec<&FieldSpec> {
        let overridden: Vec<&str> = self
            .items
            .iter()
            .filter(|spec| spec.is_kind_specific() && spec.matches(gvk))
            .map(|spec| spec.path.as_str())
            .collect();

        self.items
            .iter()
            .filter(|spec| {
                if spec.is_kind_specific() {
                    spec.matches(gvk)
                } else {
                    !overridden.contains(&spec.path.as_str())
                }
            })
            .collect()
    }

    /// Concrete paths inside `node` the matching specs point at.
    ///
    /// Wildcards expand over the elements that exist; they never create new
    /// ones. Absent paths are kept only when their spec allows creation.
    pub fn resolve(&self, node: &Node) -> Result<Vec<ResolvedPath>> {
        let mut resolved = Vec::new();
        for spec in self.matching(&node.gvk()) {
            let segments = spec.segments()?;
            let mut paths = Vec::new();
            collect_paths(
                Some(node.value()),
                &segments,
                FieldPath::new(),
                spec.create,
                &mut paths,
            );
            for path in paths {
                let candidate = ResolvedPath {
                    path,
                    create: spec.create,
                };
                if !resolved.contains(&candidate) {
                    resolved.push(candidate);
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve the specs against `node` and run `setter` on every location.
    ///
    /// Missing nodes along a creatable path are created; the leaf is created
    /// as `create_kind`. Setter failures are reported with the resource and
    /// path they happened at.
    pub fn apply<F>(&self, node: &mut Node, create_kind: NodeKind, mut setter: F) -> Result<()>
    where
        F: FnMut(&mut Value) -> Result<()>,
    {
        let resource = node.id();
        for resolved in self.resolve(node)? {
            let target = if resolved.create {
                node.lookup_create(&resolved.path, create_kind)?
            } else {
                match node.get_path_mut(&resolved.path) {
                    Some(target) => target,
                    None => continue,
                }
            };
            setter(target).map_err(|source| CoreError::Setter {
                resource: resource.clone(),
                path: resolved.path.to_string(),
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

fn collect_paths(
    value: Option<&Value>,
    segments: &[Segment],
    prefix: FieldPath,
    create: bool,
    out: &mut Vec<FieldPath>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        if value.is_some() || create {
            out.push(prefix);
        }
        return;
    };

    match (segment, value) {
        (Segment::Each, Some(Value::Sequence(items))) => {
            for (i, item) in items.iter().enumerate() {
                collect_paths(Some(item), rest, prefix.child(PathElement::Index(i)), create, out);
            }
        }
        (Segment::Each, _) => {}
        (Segment::Field(name), Some(Value::Mapping(map))) => {
            let child = prefix.child(PathElement::field(name.as_str()));
            collect_paths(map.get(name.as_str()), rest, child, create, out);
        }
        // A field step that meets a sequence visits each element
        (Segment::Field(_), Some(Value::Sequence(items))) => {
            for (i, item) in items.iter().enumerate() {
                collect_paths(Some(item), segments, prefix.child(PathElement::Index(i)), create, out);
            }
        }
        (Segment::Field(_), None | Some(Value::Null)) => {
            if create && !segments.contains(&Segment::Each) {
                let mut path = prefix;
                for segment in segments {
                    if let Segment::Field(name) = segment {
                        path.push(PathElement::field(name.as_str()));
                    }
                }
                out.push(path);
            }
        }
        (Segment::Field(_), Some(_)) => {}
    }
}
