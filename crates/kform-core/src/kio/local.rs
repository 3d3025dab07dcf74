//! Package directories on the local filesystem

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::{DEFAULT_MATCH, Reader, Writer, parse_documents, render_documents};
use crate::error::{CoreError, Result};
use crate::node::Node;
use crate::provenance::{Provenance, clear_reader_annotations, default_path};

/// Marker file of a nested package
pub const SUBPACKAGE_MARKER: &str = "Kptfile";

/// Reads every matching file under a package root
#[derive(Debug, Clone)]
pub struct LocalPackageReader {
    pub package_path: PathBuf,
    /// File name patterns to read; defaults to `*.yaml` and `*.yml`
    pub match_files_glob: Vec<String>,
    /// Descend into directories holding their own package marker
    pub include_subpackages: bool,
    /// Do not stamp provenance annotations
    pub omit_reader_annotations: bool,
}

impl LocalPackageReader {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            match_files_glob: DEFAULT_MATCH.iter().map(|s| s.to_string()).collect(),
            include_subpackages: false,
            omit_reader_annotations: false,
        }
    }

    fn patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.match_files_glob
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| CoreError::InvalidPath {
                    path: p.clone(),
                    message: format!("invalid glob pattern: {}", e),
                })
            })
            .collect()
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            return true;
        }
        !self.include_subpackages && entry.path().join(SUBPACKAGE_MARKER).exists()
    }
}

impl Reader for LocalPackageReader {
    fn read(&mut self) -> Result<Vec<Node>> {
        let root = &self.package_path;
        if !root.is_dir() {
            return Err(CoreError::FileAccess {
                path: root.display().to_string(),
                message: "package directory does not exist".to_string(),
            });
        }
        let patterns = self.patterns()?;

        let mut nodes = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped_dir(e));

        for entry in walker {
            let entry = entry.map_err(|e| CoreError::FileAccess {
                path: root.display().to_string(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !patterns.iter().any(|p| p.matches(&file_name)) {
                continue;
            }

            let relative = relative_slash_path(root, entry.path())?;
            let content = std::fs::read_to_string(entry.path()).map_err(|e| {
                CoreError::FileAccess {
                    path: relative.clone(),
                    message: format!("failed to read file: {}", e),
                }
            })?;

            let documents = parse_documents(&content)?;
            tracing::debug!("read {} documents from {}", documents.len(), relative);
            for (index, mut node) in documents.into_iter().enumerate() {
                if !self.omit_reader_annotations {
                    Provenance {
                        path: relative.clone(),
                        index,
                    }
                    .apply(&mut node)?;
                }
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}

/// Writes resources back to files under a package root, one file per
/// provenance path
#[derive(Debug, Clone)]
pub struct LocalPackageWriter {
    pub package_path: PathBuf,
    pub keep_reader_annotations: bool,
}

impl LocalPackageWriter {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            keep_reader_annotations: false,
        }
    }

    /// Write the set and return the relative paths of the files written
    pub fn write_files(&mut self, nodes: Vec<Node>) -> Result<BTreeSet<String>> {
        let mut files: BTreeMap<String, Vec<(usize, Node)>> = BTreeMap::new();
        for mut node in nodes {
            let (path, index) = match Provenance::of(&node)? {
                Some(p) => (p.path, p.index),
                None => (default_path(&node.get_meta()?), usize::MAX),
            };
            check_relative(&path)?;
            if !self.keep_reader_annotations {
                clear_reader_annotations(&mut node);
            }
            files.entry(path).or_default().push((index, node));
        }

        let mut written = BTreeSet::new();
        for (path, mut entries) in files {
            entries.sort_by_key(|(index, _)| *index);
            let nodes: Vec<Node> = entries.into_iter().map(|(_, node)| node).collect();

            let target = self.package_path.join(&path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, render_documents(&nodes)?).map_err(|e| {
                CoreError::FileAccess {
                    path: path.clone(),
                    message: format!("failed to write file: {}", e),
                }
            })?;
            tracing::info!("wrote {} resources to {}", nodes.len(), path);
            written.insert(path);
        }
        Ok(written)
    }
}

impl Writer for LocalPackageWriter {
    fn write(&mut self, nodes: Vec<Node>) -> Result<()> {
        self.write_files(nodes).map(|_| ())
    }
}

/// Reads a package and writes it back in place. Files that were read but end
/// up with no resources are deleted.
#[derive(Debug, Clone)]
pub struct LocalPackageReadWriter {
    pub package_path: PathBuf,
    pub match_files_glob: Vec<String>,
    pub include_subpackages: bool,
    pub keep_reader_annotations: bool,
    files_read: BTreeSet<String>,
}

impl LocalPackageReadWriter {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
            match_files_glob: DEFAULT_MATCH.iter().map(|s| s.to_string()).collect(),
            include_subpackages: false,
            keep_reader_annotations: false,
            files_read: BTreeSet::new(),
        }
    }

    /// Relative paths of the files seen by the last read
    pub fn files_read(&self) -> &BTreeSet<String> {
        &self.files_read
    }
}

impl Reader for LocalPackageReadWriter {
    fn read(&mut self) -> Result<Vec<Node>> {
        let mut reader = LocalPackageReader {
            package_path: self.package_path.clone(),
            match_files_glob: self.match_files_glob.clone(),
            include_subpackages: self.include_subpackages,
            omit_reader_annotations: false,
        };
        let nodes = reader.read()?;
        self.files_read = nodes
            .iter()
            .filter_map(|n| Provenance::of(n).ok().flatten())
            .map(|p| p.path)
            .collect();
        Ok(nodes)
    }
}

impl Writer for LocalPackageReadWriter {
    fn write(&mut self, nodes: Vec<Node>) -> Result<()> {
        let mut writer = LocalPackageWriter {
            package_path: self.package_path.clone(),
            keep_reader_annotations: self.keep_reader_annotations,
        };
        let written = writer.write_files(nodes)?;

        for path in self.files_read.difference(&written) {
            let target = self.package_path.join(path);
            if target.exists() {
                std::fs::remove_file(&target)?;
                tracing::info!("deleted {}", path);
            }
        }
        Ok(())
    }
}

fn relative_slash_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| CoreError::FileAccess {
        path: path.display().to_string(),
        message: "file is outside the package".to_string(),
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn check_relative(path: &str) -> Result<()> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(CoreError::FileAccess {
            path: path.to_string(),
            message: "resource path must stay inside the package".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kio::{PackageBuffer, Pipeline};
    use crate::provenance::{INDEX_ANNOTATION, PATH_ANNOTATION};
    use tempfile::TempDir;

    fn create_package() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("app.yaml"),
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n",
        )
        .unwrap();
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::write(
            root.join("config/cm.yml"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n",
        )
        .unwrap();
        std::fs::write(root.join("README.md"), "# not a resource\n").unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/x.yaml"), "kind: Hidden\n").unwrap();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/Kptfile"), "kind: Kptfile\n").unwrap();
        std::fs::write(root.join("sub/nested.yaml"), "kind: Nested\nmetadata:\n  name: n\n")
            .unwrap();
        dir
    }

    fn kinds(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.kind().unwrap().to_string()).collect()
    }

    #[test]
    fn test_reader_assigns_provenance() {
        let dir = create_package();
        let nodes = LocalPackageReader::new(dir.path()).read().unwrap();

        assert_eq!(kinds(&nodes), vec!["Service", "Deployment", "ConfigMap"]);
        assert_eq!(nodes[1].annotation(PATH_ANNOTATION), Some("app.yaml"));
        assert_eq!(nodes[1].annotation(INDEX_ANNOTATION), Some("1"));
        assert_eq!(nodes[2].annotation(PATH_ANNOTATION), Some("config/cm.yml"));
    }

    #[test]
    fn test_reader_subpackages_and_omit() {
        let dir = create_package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.include_subpackages = true;
        reader.omit_reader_annotations = true;
        let nodes = reader.read().unwrap();

        assert!(kinds(&nodes).contains(&"Nested".to_string()));
        assert!(!kinds(&nodes).contains(&"Hidden".to_string()));
        assert!(nodes.iter().all(|n| n.annotation(PATH_ANNOTATION).is_none()));
    }

    #[test]
    fn test_reader_missing_package() {
        let dir = TempDir::new().unwrap();
        let mut reader = LocalPackageReader::new(dir.path().join("missing"));
        assert!(matches!(reader.read(), Err(CoreError::FileAccess { .. })));
    }

    #[test]
    fn test_roundtrip_without_filters() {
        let dir = create_package();
        let before = std::fs::read_to_string(dir.path().join("app.yaml")).unwrap();

        let mut rw = LocalPackageReadWriter::new(dir.path());
        let nodes = rw.read().unwrap();
        rw.write(nodes).unwrap();

        let after = std::fs::read_to_string(dir.path().join("app.yaml")).unwrap();
        assert_eq!(before, after);
        assert!(!after.contains(PATH_ANNOTATION));
    }

    #[test]
    fn test_read_writer_deletes_emptied_files() {
        let dir = create_package();
        let mut rw = LocalPackageReadWriter::new(dir.path());
        let nodes = rw.read().unwrap();
        let kept: Vec<Node> = nodes
            .into_iter()
            .filter(|n| n.kind() != Some("ConfigMap"))
            .collect();
        rw.write(kept).unwrap();

        assert!(!dir.path().join("config/cm.yml").exists());
        assert!(dir.path().join("app.yaml").exists());
        assert!(dir.path().join("README.md").exists());
    }

    #[test]
    fn test_writer_uses_default_path_for_new_resources() {
        let dir = TempDir::new().unwrap();
        let mut input = PackageBuffer::new(vec![
            Node::from_yaml("kind: Secret\nmetadata:\n  name: creds\n  namespace: prod\n").unwrap(),
            Node::from_yaml("kind: Namespace\nmetadata:\n  name: prod\n").unwrap(),
        ]);
        Pipeline::new()
            .input(&mut input)
            .output(LocalPackageWriter::new(dir.path()))
            .execute()
            .unwrap();

        assert!(dir.path().join("prod/secret_creds.yaml").exists());
        assert!(dir.path().join("namespace_prod.yaml").exists());
    }

    #[test]
    fn test_writer_rejects_escaping_path() {
        let dir = TempDir::new().unwrap();
        let mut node = Node::from_yaml("kind: A\nmetadata:\n  name: a\n").unwrap();
        Provenance {
            path: "../outside.yaml".into(),
            index: 0,
        }
        .apply(&mut node)
        .unwrap();
        let err = LocalPackageWriter::new(dir.path())
            .write(vec![node])
            .unwrap_err();
        assert!(matches!(err, CoreError::FileAccess { .. }));
    }

    #[test]
    fn test_writer_orders_by_index() {
        let dir = TempDir::new().unwrap();
        let mut a = Node::from_yaml("kind: A\nmetadata:\n  name: a\n").unwrap();
        let mut b = Node::from_yaml("kind: B\nmetadata:\n  name: b\n").unwrap();
        Provenance { path: "x.yaml".into(), index: 1 }.apply(&mut a).unwrap();
        Provenance { path: "x.yaml".into(), index: 0 }.apply(&mut b).unwrap();

        LocalPackageWriter::new(dir.path()).write(vec![a, b]).unwrap();
        let content = std::fs::read_to_string(dir.path().join("x.yaml")).unwrap();
        insta::assert_snapshot!(content, @r"
        kind: B
        metadata:
          name: b
        ---
        kind: A
        metadata:
          name: a
        ");
    }
}
