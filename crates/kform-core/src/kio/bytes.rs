//! Resource streams: multi-document YAML or a single `ResourceList`

use std::io::{Read, Write};

use super::{Reader, Writer, parse_documents, render_documents};
use crate::error::Result;
use crate::node::Node;
use crate::provenance::{INDEX_ANNOTATION, clear_reader_annotations, compare_by_provenance};
use crate::resource_list::ResourceList;

/// Reads resources from a byte stream
pub struct ByteReader<R> {
    pub reader: R,
    /// Do not stamp index annotations
    pub omit_reader_annotations: bool,
    function_config: Option<Node>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            omit_reader_annotations: false,
            function_config: None,
        }
    }

    /// `functionConfig` of the last `ResourceList` read
    pub fn function_config(&self) -> Option<&Node> {
        self.function_config.as_ref()
    }
}

impl<R: Read> Reader for ByteReader<R> {
    fn read(&mut self) -> Result<Vec<Node>> {
        let mut input = String::new();
        self.reader.read_to_string(&mut input)?;

        let mut nodes = parse_documents(&input)?;
        if nodes.len() == 1 && ResourceList::is_resource_list(&nodes[0]) {
            let (items, config) = ResourceList::from_node(&nodes[0])?.into_parts();
            nodes = items;
            self.function_config = config;
        }

        if !self.omit_reader_annotations {
            for (index, node) in nodes.iter_mut().enumerate() {
                if node.annotation(INDEX_ANNOTATION).is_none() {
                    node.set_annotation(INDEX_ANNOTATION, &index.to_string())?;
                }
            }
        }
        Ok(nodes)
    }
}

/// Writes resources to a byte stream
pub struct ByteWriter<W> {
    pub writer: W,
    pub keep_reader_annotations: bool,
    /// Emit a `ResourceList` instead of a document stream
    pub wrap_in_resource_list: bool,
    pub function_config: Option<Node>,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            keep_reader_annotations: false,
            wrap_in_resource_list: false,
            function_config: None,
        }
    }
}

impl<W: Write> Writer for ByteWriter<W> {
    fn write(&mut self, mut nodes: Vec<Node>) -> Result<()> {
        nodes.sort_by(compare_by_provenance);
        if !self.keep_reader_annotations {
            nodes.iter_mut().for_each(clear_reader_annotations);
        }

        let output = if self.wrap_in_resource_list {
            ResourceList::new(nodes, self.function_config.clone()).to_yaml()?
        } else {
            render_documents(&nodes)?
        };
        self.writer.write_all(output.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}
