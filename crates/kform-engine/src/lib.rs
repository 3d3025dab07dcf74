//! kform Engine - resource filters driven by field spec tables
//!
//! Each concern (labels, annotations, selectors, namespace, names) is a
//! [`kform_core::Filter`]. [`KustomizationFilter`] chains them in a fixed order
//! from a single `kustomization.yaml` document.

pub mod error;
pub mod fieldspecs;
pub mod generators;
pub mod kustomization;
pub mod names;
pub mod patches;
pub mod setters;

pub use error::{EngineError, Result};
pub use fieldspecs::FieldSpecTables;
pub use generators::{ConfigMapArgs, ConfigMapGeneratorFilter};
pub use kustomization::{
    FILTER_ORDER, KUSTOMIZATION_FILE, Kustomization, KustomizationFilter, KustomizationSpec,
};
pub use names::{NameKey, ResetNameFilter, SetNameFilter};
pub use patches::{Patch, PatchFilter, Target};
pub use setters::{FieldMapFilter, NamespaceFilter};
