//! Built-in field spec tables
//!
//! The tables are parsed once and shared read-only by every filter.

use std::sync::Arc;

use kform_core::{FieldSpec, FieldSpecList};
use serde::{Deserialize, Deserializer};

use crate::error::Result;

const LABELS: &str = include_str!("fieldspecs/labels.yaml");
const ANNOTATIONS: &str = include_str!("fieldspecs/annotations.yaml");
const SELECTORS: &str = include_str!("fieldspecs/selectors.yaml");
const NAMESPACE: &str = include_str!("fieldspecs/namespace.yaml");
const NAME_REFERENCES: &str = include_str!("fieldspecs/name_references.yaml");

/// Fields that hold the name of another resource of `kind`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameReference {
    pub kind: String,
    #[serde(default, deserialize_with = "field_spec_sequence")]
    pub field_specs: FieldSpecList,
}

/// `fieldSpecs:` is a plain sequence rather than an `items:` list
fn field_spec_sequence<'de, D>(deserializer: D) -> std::result::Result<FieldSpecList, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<FieldSpec>::deserialize(deserializer).map(FieldSpecList::new)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NameReferenceList {
    #[serde(default)]
    items: Vec<NameReference>,
}

/// The field spec tables of every concern
#[derive(Debug, Clone)]
pub struct FieldSpecTables {
    pub labels: Arc<FieldSpecList>,
    pub annotations: Arc<FieldSpecList>,
    pub selectors: Arc<FieldSpecList>,
    pub namespace: Arc<FieldSpecList>,
    pub name_references: Arc<Vec<NameReference>>,
}

impl FieldSpecTables {
    /// Parse the tables embedded in the binary
    pub fn builtin() -> Result<Arc<Self>> {
        let name_references: NameReferenceList = serde_yaml::from_str(NAME_REFERENCES)?;
        for reference in &name_references.items {
            for spec in &reference.field_specs.items {
                spec.segments()?;
            }
        }

        Ok(Arc::new(Self {
            labels: Arc::new(FieldSpecList::from_yaml(LABELS)?),
            annotations: Arc::new(FieldSpecList::from_yaml(ANNOTATIONS)?),
            selectors: Arc::new(FieldSpecList::from_yaml(SELECTORS)?),
            namespace: Arc::new(FieldSpecList::from_yaml(NAMESPACE)?),
            name_references: Arc::new(name_references.items),
        }))
    }

    /// Field specs referring to resources of `kind`
    pub fn references_to(&self, kind: &str) -> impl Iterator<Item = &FieldSpecList> {
        self.name_references
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| &r.field_specs)
    }
}
