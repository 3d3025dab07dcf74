//! Reserved annotations and provenance tracking
//!
//! Every resource read from a package is stamped with the file it came from
//! and its position inside that file, so writers can put it back where it was.

use std::cmp::Ordering;

use crate::error::{CoreError, Result};
use crate::meta::ResourceMeta;
use crate::node::Node;

/// File the resource was read from, relative to the package root
pub const PATH_ANNOTATION: &str = "config.kubernetes.io/path";
/// Ordinal of the document inside that file
pub const INDEX_ANNOTATION: &str = "config.kubernetes.io/index";
/// Marks a document that configures the pipeline instead of being deployed
pub const LOCAL_CONFIG_ANNOTATION: &str = "config.kubernetes.io/local-config";
/// Marks a document as a function configuration
pub const FUNCTION_ANNOTATION: &str = "config.kubernetes.io/function";

/// Annotations removed from the final output unless the caller keeps them
pub const READER_ANNOTATIONS: &[&str] = &[PATH_ANNOTATION, INDEX_ANNOTATION];

/// Origin of a resource inside a package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
    pub path: String,
    pub index: usize,
}

impl Provenance {
    /// Read the provenance annotations of a node. `Ok(None)` when the node was
    /// never read from a package.
    pub fn of(node: &Node) -> Result<Option<Self>> {
        let Some(path) = node.annotation(PATH_ANNOTATION) else {
            return Ok(None);
        };
        let index = match node.annotation(INDEX_ANNOTATION) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| CoreError::InvalidProvenance {
                    resource: node.id(),
                    message: format!("index annotation '{}' is not a number", raw),
                })?,
            None => 0,
        };
        Ok(Some(Self {
            path: path.to_string(),
            index,
        }))
    }

    /// Stamp the provenance annotations on a node
    pub fn apply(&self, node: &mut Node) -> Result<()> {
        node.set_annotation(PATH_ANNOTATION, &self.path)?;
        node.set_annotation(INDEX_ANNOTATION, &self.index.to_string())
    }
}

/// Remove the reader annotations from a node
pub fn clear_reader_annotations(node: &mut Node) {
    for key in READER_ANNOTATIONS {
        node.remove_annotation(key);
    }
}

/// Path a resource without provenance is written to:
/// `<namespace>/<kind>_<name>.yaml`
pub fn default_path(meta: &ResourceMeta) -> String {
    let file = format!("{}_{}.yaml", meta.kind.to_lowercase(), meta.name);
    match &meta.namespace {
        Some(ns) => format!("{}/{}", ns, file),
        None => file,
    }
}

/// Whether a resource is marked as local configuration
pub fn is_local_config(meta: &ResourceMeta) -> bool {
    meta.annotations.contains_key(LOCAL_CONFIG_ANNOTATION)
}

/// Order two nodes by (path, index). Nodes without provenance sort last.
pub fn compare_by_provenance(a: &Node, b: &Node) -> Ordering {
    let key = |node: &Node| Provenance::of(node).ok().flatten();
    match (key(a), key(b)) {
        (Some(pa), Some(pb)) => pa.path.cmp(&pb.path).then(pa.index.cmp(&pb.index)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
