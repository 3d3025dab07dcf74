//! ConfigMap generation from literals and files

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use kform_core::{Filter, Node, Provenance};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{EngineError, Result};

/// Kustomization that generated a resource
pub const GENERATED_BY_ANNOTATION: &str = "kustomize.io/generated-by";

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("valid regex"));

/// One generated ConfigMap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigMapArgs {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// `KEY=VALUE` entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    /// `PATH` or `KEY=PATH` entries, relative to the kustomization root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Replaces previously generated ConfigMaps with freshly generated ones
#[derive(Debug, Clone, Default)]
pub struct ConfigMapGeneratorFilter {
    pub generators: Vec<ConfigMapArgs>,
    /// Directory generator files are resolved against
    pub root: PathBuf,
    pub kustomization: String,
}

impl ConfigMapGeneratorFilter {
    pub fn new(
        generators: Vec<ConfigMapArgs>,
        root: impl Into<PathBuf>,
        kustomization: impl Into<String>,
    ) -> Self {
        Self {
            generators,
            root: root.into(),
            kustomization: kustomization.into(),
        }
    }

    /// Build every configured ConfigMap
    pub fn generate(&self) -> Result<Vec<Node>> {
        self.generators.iter().map(|args| self.build(args)).collect()
    }

    fn build(&self, args: &ConfigMapArgs) -> Result<Node> {
        if args.name.is_empty() {
            return Err(EngineError::InvalidConfig {
                kind: "configMapGenerator".to_string(),
                message: "every generator needs a name".to_string(),
            });
        }

        let mut data = Mapping::new();
        let mut binary = Mapping::new();
        let mut seen = Vec::new();

        for literal in &args.literals {
            let (key, value) =
                literal
                    .split_once('=')
                    .ok_or_else(|| EngineError::InvalidLiteral {
                        generator: args.name.clone(),
                        literal: literal.clone(),
                    })?;
            self.check_key(args, key, &mut seen)?;
            data.insert(Value::from(key), Value::from(value));
        }

        for entry in &args.files {
            let (key, path) = match entry.split_once('=') {
                Some((key, path)) => (key.to_string(), path),
                None => (file_key(entry), entry.as_str()),
            };
            self.check_key(args, &key, &mut seen)?;
            let content = read_sandboxed(&self.root, path)?;
            match String::from_utf8(content) {
                Ok(text) => {
                    data.insert(Value::from(key), Value::from(text));
                }
                Err(err) => {
                    let encoded =
                        base64::engine::general_purpose::STANDARD.encode(err.as_bytes());
                    binary.insert(Value::from(key), Value::from(encoded));
                }
            }
        }

        let mut node = Node::new(Value::Mapping(Mapping::new()));
        node.set("apiVersion", Value::from("v1"), true)?;
        node.set("kind", Value::from("ConfigMap"), true)?;
        node.set_name(&args.name)?;
        if let Some(namespace) = &args.namespace {
            node.set("metadata.namespace", Value::from(namespace.as_str()), true)?;
        }
        node.set_annotation(GENERATED_BY_ANNOTATION, &self.kustomization)?;
        if !data.is_empty() {
            node.set("data", Value::Mapping(data), true)?;
        }
        if !binary.is_empty() {
            node.set("binaryData", Value::Mapping(binary), true)?;
        }
        Ok(node)
    }

    fn check_key(&self, args: &ConfigMapArgs, key: &str, seen: &mut Vec<String>) -> Result<()> {
        if !KEY_PATTERN.is_match(key) {
            return Err(EngineError::InvalidKey {
                generator: args.name.clone(),
                key: key.to_string(),
            });
        }
        if seen.iter().any(|k| k == key) {
            return Err(EngineError::InvalidConfig {
                kind: "configMapGenerator".to_string(),
                message: format!("'{}' has duplicate key '{}'", args.name, key),
            });
        }
        seen.push(key.to_string());
        Ok(())
    }
}

impl Filter for ConfigMapGeneratorFilter {
    fn filter(&mut self, nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        if self.generators.is_empty() {
            return Ok(nodes);
        }
        let generated = self.generate()?;

        let mut previous: HashMap<String, Provenance> = HashMap::new();
        let mut output = Vec::with_capacity(nodes.len() + generated.len());
        for node in nodes {
            if node.annotation(GENERATED_BY_ANNOTATION) == Some(self.kustomization.as_str()) {
                if let (Some(name), Some(provenance)) = (node.name(), Provenance::of(&node)?) {
                    previous.insert(name.to_string(), provenance);
                }
                continue;
            }
            output.push(node);
        }

        for mut node in generated {
            if let Some(provenance) = node.name().and_then(|name| previous.get(name)).cloned() {
                provenance.apply(&mut node)?;
            }
            tracing::debug!("generated {}", node.id());
            output.push(node);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "generator"
    }
}

fn file_key(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Read a file that must live inside `root`
fn read_sandboxed(root: &Path, relative: &str) -> Result<Vec<u8>> {
    let access = |message: String| EngineError::FileAccess {
        path: relative.to_string(),
        message,
    };

    if Path::new(relative).is_absolute() {
        return Err(access("absolute paths are not allowed".to_string()));
    }
    let canonical_root = root
        .canonicalize()
        .map_err(|e| access(format!("failed to resolve kustomization root: {}", e)))?;
    let canonical = root
        .join(relative)
        .canonicalize()
        .map_err(|e| access(format!("failed to resolve path: {}", e)))?;
    if !canonical.starts_with(&canonical_root) {
        return Err(access(
            "path escapes the kustomization directory".to_string(),
        ));
    }
    std::fs::read(&canonical).map_err(|e| access(format!("failed to read file: {}", e)))
}
