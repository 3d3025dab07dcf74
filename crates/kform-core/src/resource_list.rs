//! `ResourceList`: the document exchanged with functions on stdin/stdout

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::Result;
use crate::node::Node;

pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1alpha1";
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_config: Option<Value>,
}

impl ResourceList {
    pub fn new(items: Vec<Node>, function_config: Option<Node>) -> Self {
        Self {
            api_version: RESOURCE_LIST_API_VERSION.to_string(),
            kind: RESOURCE_LIST_KIND.to_string(),
            items: items.into_iter().map(Node::into_value).collect(),
            function_config: function_config.map(Node::into_value),
        }
    }

    /// Whether a document is a resource list
    pub fn is_resource_list(node: &Node) -> bool {
        node.kind() == Some(RESOURCE_LIST_KIND)
    }

    pub fn from_node(node: &Node) -> Result<Self> {
        node.unmarshal()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Split into the resources and the function configuration
    pub fn into_parts(self) -> (Vec<Node>, Option<Node>) {
        (
            self.items.into_iter().filter(|v| !v.is_null()).map(Node::new).collect(),
            self.function_config.map(Node::new),
        )
    }
}
