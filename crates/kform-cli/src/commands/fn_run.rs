//! Fn run command - run the functions of a package

use std::path::PathBuf;

use kform_core::Node;
use kform_core::provenance::FUNCTION_ANNOTATION;
use kform_fn::{RunFns, StorageMount};
use serde_yaml::{Mapping, Value};

use super::parse_pairs;
use crate::error::Result;

pub struct Options {
    pub dir: Option<PathBuf>,
    pub fn_paths: Vec<PathBuf>,
    pub image: Option<String>,
    pub global_scope: bool,
    pub network: bool,
    pub network_name: String,
    pub enable_script: bool,
    pub disable_containers: bool,
    pub strict: bool,
    pub mounts: Vec<String>,
    pub docker_binary: String,
    pub script_interpreter: String,
    pub dry_run: bool,
    pub args: Vec<String>,
}

pub fn run(options: Options) -> Result<()> {
    let storage_mounts = options
        .mounts
        .iter()
        .map(|m| m.parse::<StorageMount>())
        .collect::<kform_fn::Result<Vec<_>>>()?;

    let functions = match &options.image {
        Some(image) => vec![image_function(image, &options.args)?],
        None => Vec::new(),
    };

    let mut run_fns = RunFns {
        path: options.dir,
        function_paths: options.fn_paths,
        functions,
        global_scope: options.global_scope,
        network: options.network,
        network_name: options.network_name,
        enable_script: options.enable_script,
        disable_containers: options.disable_containers,
        strict_backends: options.strict,
        storage_mounts,
        container_binary: options.docker_binary,
        script_interpreter: options.script_interpreter,
        ..Default::default()
    };
    if options.dry_run {
        run_fns.output = Some(Box::new(std::io::stdout()));
    }

    run_fns.execute()?;
    Ok(())
}

/// Function config for `--image`: a ConfigMap whose data holds the trailing
/// `KEY=VALUE` arguments
fn image_function(image: &str, args: &[String]) -> Result<Node> {
    let declaration = serde_yaml::to_string(&kform_fn::FunctionSpec {
        container: kform_fn::spec::ContainerSpec {
            image: image.to_string(),
            ..Default::default()
        },
        ..Default::default()
    })
    .map_err(kform_core::CoreError::from)?;

    let mut node = Node::new(Value::Mapping(Mapping::new()));
    node.set("apiVersion", Value::from("v1"), true)?;
    node.set("kind", Value::from("ConfigMap"), true)?;
    node.set_name("function-input")?;
    node.set_annotation(FUNCTION_ANNOTATION, &declaration)?;

    let data: Mapping = parse_pairs("function argument", args)?
        .into_iter()
        .map(|(k, v)| (Value::from(k), Value::from(v)))
        .collect();
    if !data.is_empty() {
        node.set("data", Value::Mapping(data), true)?;
    }
    Ok(node)
}
