//! Reading, filtering and writing resource sets
//!
//! A [`Pipeline`] reads every input, runs the filters in order and hands the
//! result to every output. The resource set moves from stage to stage by
//! value, so exactly one stage owns it at a time.

mod bytes;
mod local;

pub use bytes::{ByteReader, ByteWriter};
pub use local::{LocalPackageReadWriter, LocalPackageReader, LocalPackageWriter};

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::Result;
use crate::node::Node;

/// Default file patterns read from a package
pub const DEFAULT_MATCH: &[&str] = &["*.yaml", "*.yml"];

/// Produces a resource set
pub trait Reader {
    fn read(&mut self) -> Result<Vec<Node>>;
}

/// Transforms a resource set
pub trait Filter {
    fn filter(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>>;

    /// Name used in log lines
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Consumes a resource set
pub trait Writer {
    fn write(&mut self, nodes: Vec<Node>) -> Result<()>;
}

impl<T: Reader + ?Sized> Reader for &mut T {
    fn read(&mut self) -> Result<Vec<Node>> {
        (**self).read()
    }
}

impl<T: Filter + ?Sized> Filter for &mut T {
    fn filter(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        (**self).filter(nodes)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Filter + ?Sized> Filter for Box<T> {
    fn filter(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        (**self).filter(nodes)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Writer + ?Sized> Writer for &mut T {
    fn write(&mut self, nodes: Vec<Node>) -> Result<()> {
        (**self).write(nodes)
    }
}

/// A closure used as a [`Filter`]
pub struct FilterFn<F> {
    name: String,
    f: F,
}

/// Wrap a closure as a named filter
pub fn filter_fn<F>(name: impl Into<String>, f: F) -> FilterFn<F>
where
    F: FnMut(Vec<Node>) -> Result<Vec<Node>>,
{
    FilterFn {
        name: name.into(),
        f,
    }
}

impl<F> Filter for FilterFn<F>
where
    F: FnMut(Vec<Node>) -> Result<Vec<Node>>,
{
    fn filter(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        (self.f)(nodes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Readers, filters and writers run in list order
#[derive(Default)]
pub struct Pipeline<'a> {
    pub inputs: Vec<Box<dyn Reader + 'a>>,
    pub filters: Vec<Box<dyn Filter + 'a>>,
    pub outputs: Vec<Box<dyn Writer + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, reader: impl Reader + 'a) -> Self {
        self.inputs.push(Box::new(reader));
        self
    }

    pub fn filter(mut self, filter: impl Filter + 'a) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn output(mut self, writer: impl Writer + 'a) -> Self {
        self.outputs.push(Box::new(writer));
        self
    }

    /// Run the pipeline. Stops at the first error; no writer runs after a
    /// failed read or filter.
    pub fn execute(&mut self) -> Result<()> {
        let mut nodes = Vec::new();
        for input in &mut self.inputs {
            nodes.extend(input.read()?);
        }
        tracing::debug!("read {} resources", nodes.len());

        for filter in &mut self.filters {
            tracing::debug!("running filter {}", filter.name());
            nodes = filter.filter(nodes)?;
        }

        if let Some((last, rest)) = self.outputs.split_last_mut() {
            for output in rest {
                output.write(nodes.clone())?;
            }
            last.write(nodes)?;
        }
        Ok(())
    }
}

/// In-memory resource set usable as both input and output
#[derive(Debug, Clone, Default)]
pub struct PackageBuffer {
    pub nodes: Vec<Node>,
}

impl PackageBuffer {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl Reader for PackageBuffer {
    fn read(&mut self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

impl Writer for PackageBuffer {
    fn write(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.nodes = nodes;
        Ok(())
    }
}

/// Split a `---`-separated stream into nodes, skipping empty documents
pub fn parse_documents(input: &str) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for document in serde_yaml::Deserializer::from_str(input) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            nodes.push(Node::new(value));
        }
    }
    Ok(nodes)
}

/// Render nodes as a `---`-separated stream
pub fn render_documents(nodes: &[Node]) -> Result<String> {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str("---\n");
        }
        out.push_str(&node.to_yaml()?);
    }
    Ok(out)
}
