//! Filters that run functions over part of a resource set

use kform_core::kio::{ByteReader, parse_documents};
use kform_core::{Filter, Node, Reader, ResourceList};

use crate::error::{FnError, Result};
use crate::runtime::{self, Runtime};
use crate::scope::Scope;

/// Sends its whole input to a function process as a `ResourceList` and
/// returns the resources the function wrote back
#[derive(Debug)]
pub struct ExecFilter {
    pub runtime: Box<dyn Runtime>,
    /// Passed to the function as `functionConfig`
    pub config: Node,
}

impl ExecFilter {
    pub fn new(runtime: Box<dyn Runtime>, config: Node) -> Self {
        Self { runtime, config }
    }

    fn exec(&self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        let input = ResourceList::new(nodes, Some(self.config.clone())).to_yaml()?;
        let output = runtime::run(self.runtime.as_ref(), input)?;

        let invalid = |message: String| FnError::InvalidOutput {
            function: self.runtime.name().to_string(),
            message,
        };
        // Output must be a resource stream; a bare scalar means the function misbehaved.
        let documents = parse_documents(&output).map_err(|e| invalid(e.to_string()))?;
        if let Some(bad) = documents.iter().find(|n| n.value().as_mapping().is_none()) {
            return Err(invalid(format!(
                "expected resources, found a {} document",
                bad.kind_of_node().as_str()
            )));
        }

        let mut reader = ByteReader::new(output.as_bytes());
        reader.omit_reader_annotations = true;
        Ok(reader.read()?)
    }
}

impl Filter for ExecFilter {
    fn filter(&mut self, nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        Ok(self.exec(nodes)?)
    }

    fn name(&self) -> &str {
        self.runtime.name()
    }
}

/// Restricts a function to the resources in its scope. Resources outside the
/// scope bypass the function and are appended after its output.
pub struct FunctionFilter {
    pub scope: Scope,
    pub inner: Box<dyn Filter>,
}

impl FunctionFilter {
    pub fn new(scope: Scope, inner: Box<dyn Filter>) -> Self {
        Self { scope, inner }
    }
}

impl Filter for FunctionFilter {
    fn filter(&mut self, nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        let (selected, rest) = self.scope.partition(nodes);
        tracing::debug!(
            function = self.inner.name(),
            scope = ?self.scope,
            selected = selected.len(),
            skipped = rest.len(),
            "running function"
        );
        let mut output = self.inner.filter(selected)?;
        output.extend(rest);
        Ok(output)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
