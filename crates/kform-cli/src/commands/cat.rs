//! Cat command - print the resources of a package

use std::io::Write;
use std::path::Path;

use kform_core::kio::{ByteWriter, LocalPackageReader, filter_fn};
use kform_core::provenance::FUNCTION_ANNOTATION;
use kform_core::{Node, Pipeline};

use crate::error::Result;

pub fn run(
    dir: &Path,
    include_subpackages: bool,
    annotate: bool,
    include_functions: bool,
    wrap: bool,
    function_config: Option<&Path>,
) -> Result<()> {
    let function_config = match function_config {
        Some(path) => Some(Node::from_yaml(&std::fs::read_to_string(path)?)?),
        None => None,
    };

    cat(
        dir,
        CatOptions {
            include_subpackages,
            annotate,
            include_functions,
            wrap,
            function_config,
        },
        std::io::stdout(),
    )
}

#[derive(Debug, Default)]
struct CatOptions {
    include_subpackages: bool,
    annotate: bool,
    include_functions: bool,
    wrap: bool,
    function_config: Option<Node>,
}

fn cat(dir: &Path, options: CatOptions, out: impl Write) -> Result<()> {
    let mut reader = LocalPackageReader::new(dir);
    reader.include_subpackages = options.include_subpackages;

    let include_functions = options.include_functions;
    let drop_functions = filter_fn("exclude-functions", move |nodes: Vec<Node>| {
        Ok(nodes
            .into_iter()
            .filter(|n| include_functions || n.annotation(FUNCTION_ANNOTATION).is_none())
            .collect())
    });

    let mut writer = ByteWriter::new(out);
    writer.keep_reader_annotations = options.annotate;
    writer.wrap_in_resource_list = options.wrap;
    writer.function_config = options.function_config;

    Pipeline::new()
        .input(reader)
        .filter(drop_functions)
        .output(writer)
        .execute()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("f1.yaml"),
            "kind: Deployment\nmetadata:\n  name: foo\nspec:\n  replicas: 1\n---\nkind: Service\nmetadata:\n  name: foo\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("fn.yaml"),
            "kind: Fn\nmetadata:\n  name: setter\n  annotations:\n    config.kubernetes.io/function: \"container: {image: fn}\"\n",
        )
        .unwrap();
        dir
    }

    fn cat_string(dir: &Path, options: CatOptions) -> String {
        let mut out = Vec::new();
        cat(dir, options, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_cat_excludes_functions() {
        let dir = package();
        insta::assert_snapshot!(cat_string(dir.path(), CatOptions::default()), @r"
        kind: Deployment
        metadata:
          name: foo
        spec:
          replicas: 1
        ---
        kind: Service
        metadata:
          name: foo
        ");
    }

    #[test]
    fn test_cat_includes_functions_and_annotations() {
        let dir = package();
        let output = cat_string(
            dir.path(),
            CatOptions {
                include_functions: true,
                annotate: true,
                ..Default::default()
            },
        );
        assert!(output.contains("name: setter"));
        assert!(output.contains("config.kubernetes.io/path: f1.yaml"));
    }

    #[test]
    fn test_cat_wraps_in_resource_list() {
        let dir = package();
        let output = cat_string(
            dir.path(),
            CatOptions {
                wrap: true,
                function_config: Some(Node::from_yaml("kind: Config\nmetadata:\n  name: c\n").unwrap()),
                ..Default::default()
            },
        );
        assert!(output.starts_with("apiVersion: config.kubernetes.io/v1alpha1\nkind: ResourceList\n"));
        assert!(output.contains("functionConfig:"));
    }
}
