//! Which resources a function sees

use kform_core::Node;
use kform_core::provenance::PATH_ANNOTATION;

/// Directory that holds function configs without owning resources
pub const FUNCTIONS_DIR: &str = "functions";

/// Resources a function applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Resources whose provenance path lies under `dir`; `.` is the package root
    Local { dir: String },
    /// Every resource in the set
    Global,
}

impl Scope {
    pub fn contains(&self, node: &Node) -> bool {
        match self {
            Scope::Global => true,
            Scope::Local { dir } if dir == "." => true,
            Scope::Local { dir } => node
                .annotation(PATH_ANNOTATION)
                .and_then(|path| path.strip_prefix(dir.as_str()))
                .is_some_and(|rest| rest.starts_with('/')),
        }
    }

    /// Split a resource set into the resources in scope and the rest,
    /// keeping relative order in both halves
    pub fn partition(&self, nodes: Vec<Node>) -> (Vec<Node>, Vec<Node>) {
        nodes.into_iter().partition(|node| self.contains(node))
    }
}

/// Directory owning a function config: the directory of its file, or the
/// parent of that directory when it is named `functions`
pub fn function_dir(config: &Node) -> String {
    let path = config.annotation(PATH_ANNOTATION).unwrap_or_default();
    let dir = parent(path);
    match dir.rsplit_once('/') {
        Some((up, FUNCTIONS_DIR)) => up.to_string(),
        None if dir == FUNCTIONS_DIR => ".".to_string(),
        _ => dir.to_string(),
    }
}

/// Number of directory levels below the package root
pub fn depth(dir: &str) -> usize {
    if dir == "." || dir.is_empty() {
        0
    } else {
        dir.split('/').filter(|s| !s.is_empty()).count()
    }
}

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => ".",
        Some((dir, _)) => dir,
    }
}
