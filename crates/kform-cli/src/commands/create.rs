//! Create command - scaffold a kustomization

use console::style;
use indexmap::IndexMap;
use std::fs;
use std::path::PathBuf;

use kform_engine::{KUSTOMIZATION_FILE, Kustomization};

use super::parse_pairs;
use crate::error::{CliError, Result};

pub struct Options {
    pub dir: PathBuf,
    pub name: String,
    pub namespace: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    pub annotations: Vec<String>,
    pub labels: Vec<String>,
    pub selectors: Vec<String>,
}

pub fn run(options: Options) -> Result<()> {
    let target = options.dir.join(KUSTOMIZATION_FILE);
    if target.exists() {
        return Err(CliError::config(format!(
            "{} already exists",
            target.display()
        )));
    }

    let kustomization = build(&options)?;
    fs::create_dir_all(&options.dir)?;
    fs::write(&target, kustomization.to_yaml()?)?;

    println!(
        "{} Created kustomization {} in {}",
        style("✓").green().bold(),
        style(&options.name).cyan(),
        style(target.display()).dim()
    );
    Ok(())
}

fn build(options: &Options) -> Result<Kustomization> {
    let pairs = |flag: &str, values: &[String]| -> Result<IndexMap<String, Option<String>>> {
        Ok(parse_pairs(flag, values)?
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect())
    };

    let mut kustomization = Kustomization::new(&options.name);
    let spec = &mut kustomization.spec;
    spec.common_namespace = options.namespace.clone().unwrap_or_default();
    spec.name_prefix = options.name_prefix.clone().unwrap_or_default();
    spec.name_suffix = options.name_suffix.clone().unwrap_or_default();
    spec.common_annotations = pairs("--annotation", &options.annotations)?;
    spec.common_labels = pairs("--label", &options.labels)?;
    spec.common_selectors = pairs("--selector", &options.selectors)?;
    Ok(kustomization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: PathBuf) -> Options {
        Options {
            dir,
            name: "app".into(),
            namespace: Some("prod".into()),
            name_prefix: Some("p-".into()),
            name_suffix: None,
            annotations: vec![],
            labels: vec!["env=prod".into()],
            selectors: vec![],
        }
    }

    #[test]
    fn test_build_kustomization() {
        let kustomization = build(&options(PathBuf::from("."))).unwrap();
        insta::assert_snapshot!(kustomization.to_yaml().unwrap(), @r"
        apiVersion: kustomize.io/v1alpha1
        kind: BlueprintKustomization
        metadata:
          name: app
        spec:
          namePrefix: p-
          commonNamespace: prod
          commonLabels:
            env: prod
        ");
    }

    #[test]
    fn test_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        run(options(dir.path().to_path_buf())).unwrap();
        let written = fs::read_to_string(dir.path().join(KUSTOMIZATION_FILE)).unwrap();
        assert!(Kustomization::from_yaml(&written).is_ok());

        let err = run(options(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_invalid_label() {
        let mut opts = options(PathBuf::from("."));
        opts.labels = vec!["env".into()];
        assert!(matches!(build(&opts), Err(CliError::Usage { .. })));
    }
}
