//! Field paths used to address values inside a document.

use std::fmt;

use crate::error::{CoreError, Result};

/// One level of path navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// Field name in a mapping
    Field(String),
    /// Position in a sequence
    Index(usize),
}

impl PathElement {
    pub fn field(name: impl Into<String>) -> Self {
        PathElement::Field(name.into())
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathElement::Field(name) => Some(name),
            PathElement::Index(_) => None,
        }
    }
}

/// A complete path to a nested value, e.g. `spec.containers[0].image`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    elements: Vec<PathElement>,
}

impl FieldPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Build a path of plain field names. Use this when a field name contains
    /// dots, such as annotation keys.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elements: fields.into_iter().map(PathElement::field).collect(),
        }
    }

    /// Parse a dotted/indexed path such as `spec.template.spec.containers[0].name`.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut elements = Vec::new();
        if path.is_empty() {
            return Ok(Self { elements });
        }

        for part in path.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if name.is_empty() && rest.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if !name.is_empty() {
                elements.push(PathElement::field(name));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("sequence index must be a non-negative integer"))?;
                elements.push(PathElement::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after ']'"));
                }
            }
        }

        Ok(Self { elements })
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    /// Return a new path with `element` appended
    pub fn child(&self, element: PathElement) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self { elements }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Field(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
                PathElement::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_and_indexed() {
        let path = FieldPath::parse("spec.containers[0].image").unwrap();
        assert_eq!(
            path.elements(),
            &[
                PathElement::field("spec"),
                PathElement::field("containers"),
                PathElement::Index(0),
                PathElement::field("image"),
            ]
        );
        assert_eq!(path.to_string(), "spec.containers[0].image");
    }

    #[test]
    fn test_parse_nested_indices() {
        let path = FieldPath::parse("matrix[1][2]").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "matrix[1][2]");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(FieldPath::parse("spec..name").is_err());
        assert!(FieldPath::parse("items[x]").is_err());
        assert!(FieldPath::parse("items[0").is_err());
        assert!(FieldPath::parse("items[0]x").is_err());
    }

    #[test]
    fn test_from_fields_keeps_dots() {
        let path = FieldPath::from_fields(["metadata", "annotations", "config.kubernetes.io/path"]);
        assert_eq!(path.len(), 3);
        assert_eq!(
            path.elements()[2].as_field(),
            Some("config.kubernetes.io/path")
        );
    }
}
