//! Discover, order and run the functions of a package
//!
//! [`RunFns::execute`] reads the package (or a stream), collects function
//! declarations from four sources, sorts them deepest directory first and runs
//! them as one [`Pipeline`]. The result goes to `output` when one is set, and
//! back to the package files otherwise.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use kform_core::kio::{
    ByteReader, ByteWriter, LocalPackageReadWriter, LocalPackageReader, PackageBuffer,
};
use kform_core::{Filter, Node, Pipeline, Reader};

use crate::error::{FnError, Result};
use crate::filter::{ExecFilter, FunctionFilter};
use crate::order::sort_functions;
use crate::runtime::{
    ContainerRuntime, DEFAULT_CONTAINER_BINARY, DEFAULT_SCRIPT_INTERPRETER, ScriptRuntime,
    StorageMount,
};
use crate::spec::{FunctionDescriptor, FunctionSpec};

/// Files holding function declarations next to the resources they act on
pub const FN_FILE_GLOB: &str = "*.fn";
/// Container network granted to functions that require one
pub const DEFAULT_NETWORK_NAME: &str = "bridge";

/// Builds the filter that runs one function. `Ok(None)` means no backend
/// accepts the function.
pub type FilterProvider =
    Box<dyn FnMut(&FunctionSpec, &Node) -> Result<Option<Box<dyn Filter>>>>;

/// Options of a function run
pub struct RunFns {
    /// Package root; `None` reads from `input` (stdin by default) and writes
    /// to `output` (stdout by default)
    pub path: Option<PathBuf>,
    /// Directories of globally scoped function configs
    pub function_paths: Vec<PathBuf>,
    /// Globally scoped function configs
    pub functions: Vec<Node>,
    /// Apply functions found in the package to the whole package
    pub global_scope: bool,
    pub input: Option<Box<dyn Read>>,
    pub output: Option<Box<dyn Write>>,
    /// Allow functions that declare `network.required`
    pub network: bool,
    pub network_name: String,
    /// Ignore functions declared in the package. Defaults to true when
    /// `function_paths` or `functions` is non-empty.
    pub no_functions_from_input: Option<bool>,
    pub enable_script: bool,
    pub disable_containers: bool,
    /// Fail instead of skipping functions no enabled backend can run
    pub strict_backends: bool,
    pub storage_mounts: Vec<StorageMount>,
    pub container_binary: String,
    pub script_interpreter: String,
    pub function_filter_provider: Option<FilterProvider>,
}

impl Default for RunFns {
    fn default() -> Self {
        Self {
            path: None,
            function_paths: Vec::new(),
            functions: Vec::new(),
            global_scope: false,
            input: None,
            output: None,
            network: false,
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            no_functions_from_input: None,
            enable_script: false,
            disable_containers: false,
            strict_backends: false,
            storage_mounts: Vec::new(),
            container_binary: DEFAULT_CONTAINER_BINARY.to_string(),
            script_interpreter: DEFAULT_SCRIPT_INTERPRETER.to_string(),
            function_filter_provider: None,
        }
    }
}

impl RunFns {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Run every discovered function and write the result. Nothing is
    /// written when any step fails.
    pub fn execute(mut self) -> Result<()> {
        let path = self.path.as_deref().map(std::path::absolute).transpose()?;
        if path.is_none() {
            if self.input.is_none() {
                self.input = Some(Box::new(std::io::stdin()));
            }
            if self.output.is_none() {
                self.output = Some(Box::new(std::io::stdout()));
            }
        }

        let mut package = path.clone().map(LocalPackageReadWriter::new);
        let nodes = match (self.input.take(), package.as_mut()) {
            (Some(input), _) => ByteReader::new(input).read()?,
            (None, Some(package)) => package.read()?,
            (None, None) => Vec::new(),
        };

        let functions = self.discover(&nodes, path.as_deref())?;
        let filters = self.build_filters(functions)?;
        tracing::info!("running {} functions over {} resources", filters.len(), nodes.len());

        let mut pipeline = Pipeline::new().input(PackageBuffer::new(nodes));
        for filter in filters {
            pipeline = pipeline.filter(filter);
        }
        pipeline = match (self.output.take(), package.as_mut()) {
            (Some(output), _) => pipeline.output(ByteWriter::new(output)),
            (None, Some(package)) => pipeline.output(package),
            (None, None) => pipeline,
        };
        pipeline.execute()?;
        Ok(())
    }

    /// Collect function declarations from every enabled source, in run order
    pub fn discover(&self, nodes: &[Node], path: Option<&Path>) -> Result<Vec<FunctionDescriptor>> {
        let from_input = !self
            .no_functions_from_input
            .unwrap_or(!self.function_paths.is_empty() || !self.functions.is_empty());

        let mut functions = Vec::new();
        let mut collect = |configs: Vec<Node>, global: bool| -> Result<()> {
            for config in configs {
                if let Some(function) = FunctionDescriptor::from_node(config, global)? {
                    functions.push(function);
                }
            }
            Ok(())
        };

        if from_input {
            collect(nodes.to_vec(), self.global_scope)?;
            if let Some(path) = path {
                let mut reader = LocalPackageReader::new(path);
                reader.match_files_glob = vec![FN_FILE_GLOB.to_string()];
                collect(reader.read()?, self.global_scope)?;
            }
        }
        for dir in &self.function_paths {
            collect(LocalPackageReader::new(dir).read()?, true)?;
        }
        collect(self.functions.clone(), true)?;

        sort_functions(&mut functions);
        Ok(functions)
    }

    fn build_filters(&mut self, functions: Vec<FunctionDescriptor>) -> Result<Vec<FunctionFilter>> {
        let mut provider = self.function_filter_provider.take();
        let mut filters = Vec::with_capacity(functions.len());

        for FunctionDescriptor {
            mut spec,
            config,
            scope,
        } in functions
        {
            if spec.container.network.required {
                if !self.network {
                    return Err(FnError::NetworkRequired {
                        function: spec.display_name().to_string(),
                    });
                }
                spec.network = Some(self.network_name.clone());
            }

            let inner = match provider.as_mut() {
                Some(provide) => provide(&spec, &config)?,
                None => self.default_filter(&spec, &config),
            };
            match inner {
                Some(inner) => filters.push(FunctionFilter::new(scope, inner)),
                None if self.strict_backends => {
                    return Err(FnError::UnsupportedFunction {
                        function: config.id(),
                    });
                }
                None => {
                    tracing::warn!(
                        function = %config.id(),
                        "no enabled backend can run function, skipping"
                    );
                }
            }
        }

        self.function_filter_provider = provider;
        Ok(filters)
    }

    fn default_filter(&self, spec: &FunctionSpec, config: &Node) -> Option<Box<dyn Filter>> {
        if !self.disable_containers && !spec.container.image.is_empty() {
            let runtime = ContainerRuntime {
                binary: self.container_binary.clone(),
                image: spec.container.image.clone(),
                network: spec.network.clone(),
                mounts: self.storage_mounts.clone(),
            };
            return Some(Box::new(ExecFilter::new(Box::new(runtime), config.clone())));
        }
        if self.enable_script && !spec.script.path.is_empty() {
            let path = match &self.path {
                Some(root) => root.join(&spec.script.path),
                None => PathBuf::from(&spec.script.path),
            };
            let runtime = ScriptRuntime {
                interpreter: self.script_interpreter.clone(),
                path,
                name: spec.script.name.clone(),
            };
            return Some(Box::new(ExecFilter::new(Box::new(runtime), config.clone())));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kform_core::kio::filter_fn;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn function_yaml(name: &str, image: &str) -> String {
        format!(
            "apiVersion: example.com/v1\nkind: Fn\nmetadata:\n  name: {name}\n  annotations:\n    config.kubernetes.io/function: |\n      container:\n        image: {image}\n"
        )
    }

    fn resource_yaml(name: &str) -> String {
        format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\n")
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let target = dir.path().join(path);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, content).unwrap();
    }

    /// Provider whose filters stamp `ran-by: <image>` on every resource they
    /// see and record the order they ran in
    fn stamping_provider(log: Rc<RefCell<Vec<String>>>) -> FilterProvider {
        Box::new(move |spec: &FunctionSpec, _config: &Node| {
            let image = spec.container.image.clone();
            let log = log.clone();
            let filter = filter_fn(image.clone(), move |mut nodes: Vec<Node>| {
                log.borrow_mut().push(image.clone());
                for node in &mut nodes {
                    if node.kind() == Some("ConfigMap") {
                        node.set_annotation("ran-by", &image)?;
                    }
                }
                Ok(nodes)
            });
            Ok(Some(Box::new(filter) as Box<dyn Filter>))
        })
    }

    #[test]
    fn test_functions_run_deepest_first() {
        let dir = TempDir::new().unwrap();
        write(&dir, "fn.yaml", &function_yaml("root", "root"));
        write(&dir, "a/fn.yaml", &function_yaml("a", "a"));
        write(&dir, "a/b/fn.yaml", &function_yaml("ab", "ab"));
        write(&dir, "c/fn.yaml", &function_yaml("c", "c"));

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut run = RunFns::new(dir.path());
        run.function_filter_provider = Some(stamping_provider(log.clone()));
        run.execute().unwrap();

        assert_eq!(*log.borrow(), ["ab", "a", "c", "root"]);
    }

    #[test]
    fn test_local_scope_limits_resources() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a/functions/fn.yaml", &function_yaml("a", "fn-a"));
        write(&dir, "a/cm.yaml", &resource_yaml("inside"));
        write(&dir, "b/cm.yaml", &resource_yaml("outside"));

        let mut run = RunFns::new(dir.path());
        run.function_filter_provider = Some(stamping_provider(Rc::default()));
        run.execute().unwrap();

        let inside = fs::read_to_string(dir.path().join("a/cm.yaml")).unwrap();
        let outside = fs::read_to_string(dir.path().join("b/cm.yaml")).unwrap();
        assert!(inside.contains("ran-by: fn-a"), "{inside}");
        assert!(!outside.contains("ran-by"), "{outside}");
        assert!(!inside.contains("config.kubernetes.io/path"));
    }

    #[test]
    fn test_global_scope_sees_everything() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a/fn.yaml", &function_yaml("a", "fn-a"));
        write(&dir, "b/cm.yaml", &resource_yaml("outside"));

        let mut run = RunFns::new(dir.path());
        run.global_scope = true;
        run.function_filter_provider = Some(stamping_provider(Rc::default()));
        run.execute().unwrap();

        let outside = fs::read_to_string(dir.path().join("b/cm.yaml")).unwrap();
        assert!(outside.contains("ran-by: fn-a"));
    }

    #[test]
    fn test_fn_files_are_discovered() {
        let dir = TempDir::new().unwrap();
        write(&dir, "setters.fn", &function_yaml("setters", "fn-file"));
        write(&dir, "cm.yaml", &resource_yaml("cm"));

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut run = RunFns::new(dir.path());
        run.function_filter_provider = Some(stamping_provider(log.clone()));
        run.execute().unwrap();

        assert_eq!(*log.borrow(), ["fn-file"]);
        assert!(dir.path().join("setters.fn").exists());
    }

    #[test]
    fn test_explicit_functions_disable_package_functions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "fn.yaml", &function_yaml("local", "local"));
        write(&dir, "a/cm.yaml", &resource_yaml("cm"));

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut run = RunFns::new(dir.path());
        run.functions = vec![Node::from_yaml(&function_yaml("explicit", "explicit")).unwrap()];
        run.function_filter_provider = Some(stamping_provider(log.clone()));
        run.execute().unwrap();
        assert_eq!(*log.borrow(), ["explicit"]);

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut run = RunFns::new(dir.path());
        run.functions = vec![Node::from_yaml(&function_yaml("explicit", "explicit")).unwrap()];
        run.no_functions_from_input = Some(false);
        run.function_filter_provider = Some(stamping_provider(log.clone()));
        run.execute().unwrap();
        assert_eq!(*log.borrow(), ["local", "explicit"]);
    }

    #[test]
    fn test_network_must_be_enabled() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "fn.yaml",
            "kind: Fn\nmetadata:\n  name: net\n  annotations:\n    config.kubernetes.io/function: |\n      container:\n        image: net\n        network:\n          required: true\n",
        );

        let mut run = RunFns::new(dir.path());
        run.function_filter_provider = Some(stamping_provider(Rc::default()));
        let err = run.execute().unwrap_err();
        assert!(matches!(err, FnError::NetworkRequired { ref function } if function == "net"));

        let granted = Rc::new(RefCell::new(None));
        let seen = granted.clone();
        let mut run = RunFns::new(dir.path());
        run.network = true;
        run.network_name = "fn-net".into();
        run.function_filter_provider = Some(Box::new(move |spec: &FunctionSpec, _: &Node| {
            *seen.borrow_mut() = spec.network.clone();
            Ok(None)
        }));
        run.execute().unwrap();
        assert_eq!(granted.borrow().as_deref(), Some("fn-net"));
    }

    #[test]
    fn test_unsupported_functions_skip_or_fail() {
        let dir = TempDir::new().unwrap();
        write(&dir, "fn.yaml", &function_yaml("img", "gcr.io/example/fn"));
        write(&dir, "cm.yaml", &resource_yaml("cm"));

        let mut run = RunFns::new(dir.path());
        run.disable_containers = true;
        run.execute().unwrap();
        assert!(dir.path().join("cm.yaml").exists());

        let mut run = RunFns::new(dir.path());
        run.disable_containers = true;
        run.strict_backends = true;
        let err = run.execute().unwrap_err();
        assert!(matches!(err, FnError::UnsupportedFunction { ref function } if function == "Fn/img"));
    }

    #[test]
    fn test_writeback_deletes_emptied_files_and_places_new_resources() {
        let dir = TempDir::new().unwrap();
        write(&dir, "fn.yaml", &function_yaml("prune", "prune"));
        write(&dir, "old.yaml", &resource_yaml("old"));

        let mut run = RunFns::new(dir.path());
        run.function_filter_provider = Some(Box::new(|_: &FunctionSpec, _: &Node| {
            let filter = filter_fn("prune", |nodes: Vec<Node>| {
                let mut kept: Vec<Node> = nodes
                    .into_iter()
                    .filter(|n| n.name() != Some("old"))
                    .collect();
                kept.push(Node::from_yaml(&resource_yaml("fresh"))?);
                Ok(kept)
            });
            Ok(Some(Box::new(filter) as Box<dyn Filter>))
        }));
        run.execute().unwrap();

        assert!(!dir.path().join("old.yaml").exists());
        assert!(dir.path().join("fn.yaml").exists());
        let fresh = fs::read_to_string(dir.path().join("configmap_fresh.yaml")).unwrap();
        assert!(fresh.contains("name: fresh"));
    }

    #[test]
    fn test_stream_input_and_output() {
        let dir = TempDir::new().unwrap();
        let out_path = dir.path().join("out.yaml");
        let input = format!("{}---\n{}", function_yaml("f", "img"), resource_yaml("cm"));

        let mut run = RunFns::default();
        run.input = Some(Box::new(std::io::Cursor::new(input)));
        run.output = Some(Box::new(fs::File::create(&out_path).unwrap()));
        run.function_filter_provider = Some(stamping_provider(Rc::default()));
        run.execute().unwrap();

        let output = fs::read_to_string(&out_path).unwrap();
        assert!(output.contains("ran-by: img"), "{output}");
        assert!(!output.contains("config.kubernetes.io/index"));
    }
}
