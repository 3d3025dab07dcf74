//! Function declarations carried in resource annotations
//!
//! A resource becomes a function configuration when it holds the
//! `config.kubernetes.io/function` annotation. The annotation value is itself
//! YAML naming the backend:
//!
//! ```yaml
//! container:
//!   image: gcr.io/example/fn:v1
//!   network:
//!     required: true
//! ```

use kform_core::Node;
use kform_core::provenance::FUNCTION_ANNOTATION;
use serde::{Deserialize, Serialize};

use crate::error::{FnError, Result};
use crate::scope::{Scope, function_dir};

/// Network requirements of a container function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    pub image: String,
    pub network: NetworkSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSpec {
    /// Script file, relative to the package root
    pub path: String,
    pub name: String,
}

/// Backend declaration parsed from the function annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSpec {
    pub container: ContainerSpec,
    #[serde(alias = "starlark")]
    pub script: ScriptSpec,
    /// Network the function may use; granted by the orchestrator
    #[serde(skip)]
    pub network: Option<String>,
}

impl FunctionSpec {
    /// Parse the annotation value
    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Read the function declaration of a resource, if it has one
    pub fn from_node(node: &Node) -> Result<Option<Self>> {
        let Some(text) = node.annotation(FUNCTION_ANNOTATION) else {
            return Ok(None);
        };
        Self::parse(text)
            .map(Some)
            .map_err(|e| FnError::InvalidFunctionSpec {
                resource: node.id(),
                message: e.to_string(),
            })
    }

    /// Image or script name, used in logs and errors
    pub fn display_name(&self) -> &str {
        if !self.container.image.is_empty() {
            &self.container.image
        } else if !self.script.name.is_empty() {
            &self.script.name
        } else {
            &self.script.path
        }
    }
}

/// A discovered function: what to run, with which config, over which resources
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub spec: FunctionSpec,
    /// The resource that declared the function, passed as `functionConfig`
    pub config: Node,
    pub scope: Scope,
}

impl FunctionDescriptor {
    /// Build a descriptor from a resource carrying the function annotation.
    /// Returns `None` for ordinary resources.
    pub fn from_node(config: Node, global: bool) -> Result<Option<Self>> {
        let Some(spec) = FunctionSpec::from_node(&config)? else {
            return Ok(None);
        };
        let scope = if global {
            Scope::Global
        } else {
            Scope::Local {
                dir: function_dir(&config),
            }
        };
        Ok(Some(Self {
            spec,
            config,
            scope,
        }))
    }

    /// Directory owning the function, used for ordering
    pub fn dir(&self) -> String {
        function_dir(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER_FN: &str = r#"
apiVersion: example.com/v1
kind: SetReplicas
metadata:
  name: replicas
  annotations:
    config.kubernetes.io/function: |
      container:
        image: gcr.io/example/fn:v1
        network:
          required: true
    config.kubernetes.io/path: apps/web/replicas.yaml
"#;

    #[test]
    fn test_parse_container_function() {
        let node = Node::from_yaml(CONTAINER_FN).unwrap();
        let spec = FunctionSpec::from_node(&node).unwrap().unwrap();
        assert_eq!(spec.container.image, "gcr.io/example/fn:v1");
        assert!(spec.container.network.required);
        assert!(spec.script.path.is_empty());
        assert_eq!(spec.display_name(), "gcr.io/example/fn:v1");
    }

    #[test]
    fn test_starlark_alias() {
        let spec = FunctionSpec::parse("starlark:\n  path: fns/a.star\n  name: set-a\n").unwrap();
        assert_eq!(spec.script.path, "fns/a.star");
        assert_eq!(spec.display_name(), "set-a");
    }

    #[test]
    fn test_plain_resource_is_not_a_function() {
        let node = Node::from_yaml("kind: Service\nmetadata:\n  name: web\n").unwrap();
        assert!(FunctionSpec::from_node(&node).unwrap().is_none());
        assert!(FunctionDescriptor::from_node(node, false).unwrap().is_none());
    }

    #[test]
    fn test_invalid_annotation() {
        let node = Node::from_yaml(
            "kind: Fn\nmetadata:\n  name: bad\n  annotations:\n    config.kubernetes.io/function: \"container: [\"\n",
        )
        .unwrap();
        let err = FunctionSpec::from_node(&node).unwrap_err();
        assert!(matches!(err, FnError::InvalidFunctionSpec { ref resource, .. } if resource == "Fn/bad"));
    }

    #[test]
    fn test_descriptor_scope() {
        let node = Node::from_yaml(CONTAINER_FN).unwrap();
        let local = FunctionDescriptor::from_node(node.clone(), false)
            .unwrap()
            .unwrap();
        assert_eq!(
            local.scope,
            Scope::Local {
                dir: "apps/web".into()
            }
        );
        let global = FunctionDescriptor::from_node(node, true).unwrap().unwrap();
        assert_eq!(global.scope, Scope::Global);
        assert_eq!(global.dir(), "apps/web");
    }
}
