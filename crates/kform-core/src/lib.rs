//! kform Core - resource documents and the pipeline they flow through
//!
//! This crate provides the foundational types used throughout kform:
//! - `Node`: one structured resource document
//! - `FieldSpecList`: where a concern lives inside a resource, per kind
//! - `merge_patch`: strategic merge of patch fragments
//! - `kio`: readers, filters, writers and the `Pipeline` that runs them
//! - `ResourceList`: the function input/output document

pub mod error;
pub mod fieldspec;
pub mod kio;
pub mod merge;
pub mod meta;
pub mod node;
pub mod path;
pub mod provenance;
pub mod resource_list;

pub use error::{CoreError, Result};
pub use fieldspec::{FieldSpec, FieldSpecList, ResolvedPath, Segment};
pub use kio::{Filter, Pipeline, Reader, Writer};
pub use merge::merge_patch;
pub use meta::{Gvk, ResourceMeta};
pub use node::{Node, NodeKind};
pub use path::{FieldPath, PathElement};
pub use provenance::Provenance;
pub use resource_list::ResourceList;
