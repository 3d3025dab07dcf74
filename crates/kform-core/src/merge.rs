//! Strategic merge of a patch fragment into a document
//!
//! Mappings merge key by key, the patch wins on scalars, sequences are
//! replaced wholesale and a `null` patch value deletes the field. A patch that
//! would turn a mapping into a scalar (or the other way around) is rejected.

use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};
use crate::node::{Node, NodeKind};
use crate::path::{FieldPath, PathElement};

/// Merge `patch` into `target`. The target is left untouched on error.
pub fn merge_patch(target: &mut Node, patch: &Value) -> Result<()> {
    let Value::Mapping(patch_map) = patch else {
        return Err(CoreError::InvalidPatch {
            message: format!(
                "patch must be a mapping, found {}",
                NodeKind::of(patch).as_str()
            ),
        });
    };

    let mut merged = target.value().clone();
    if merged.is_null() {
        merged = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(base_map) = &mut merged else {
        return Err(CoreError::MergeConflict {
            path: String::new(),
            message: format!(
                "cannot merge a mapping into a {}",
                target.kind_of_node().as_str()
            ),
        });
    };
    merge_mapping(base_map, patch_map, &FieldPath::new())?;

    *target.value_mut() = merged;
    Ok(())
}

fn merge_mapping(base: &mut Mapping, patch: &Mapping, at: &FieldPath) -> Result<()> {
    for (key, patch_value) in patch {
        let path = match key.as_str() {
            Some(name) => at.child(PathElement::field(name)),
            None => at.clone(),
        };

        if patch_value.is_null() {
            base.remove(key);
            continue;
        }

        match base.get_mut(key) {
            Some(base_value) => merge_value(base_value, patch_value, &path)?,
            None => {
                base.insert(key.clone(), without_nulls(patch_value));
            }
        }
    }
    Ok(())
}

fn merge_value(base: &mut Value, patch: &Value, at: &FieldPath) -> Result<()> {
    match (NodeKind::of(base), NodeKind::of(patch)) {
        (NodeKind::Mapping, NodeKind::Mapping) => {
            if let (Value::Mapping(base_map), Value::Mapping(patch_map)) = (&mut *base, patch) {
                merge_mapping(base_map, patch_map, at)?;
            }
            Ok(())
        }
        (NodeKind::Null, _) => {
            *base = without_nulls(patch);
            Ok(())
        }
        (left, right) if left == right => {
            *base = without_nulls(patch);
            Ok(())
        }
        (left, right) => Err(CoreError::MergeConflict {
            path: at.to_string(),
            message: format!(
                "patch has a {} where the resource has a {}",
                right.as_str(),
                left.as_str()
            ),
        }),
    }
}

fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
