//! The kustomization document and the composite filter it configures

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use kform_core::provenance::{LOCAL_CONFIG_ANNOTATION, is_local_config};
use kform_core::{CoreError, Filter, Node};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{EngineError, Result};
use crate::fieldspecs::FieldSpecTables;
use crate::generators::{ConfigMapArgs, ConfigMapGeneratorFilter};
use crate::names::{ResetNameFilter, SetNameFilter};
use crate::patches::{Patch, PatchFilter};
use crate::setters::{FieldMapFilter, NamespaceFilter};

pub const KUSTOMIZATION_API_VERSION: &str = "kustomize.io/v1alpha1";
pub const KUSTOMIZATION_KIND: &str = "BlueprintKustomization";
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Order in which the sub-filters run
pub const FILTER_ORDER: &[&str] = &[
    "reset",
    "generator",
    "patch",
    "annotations",
    "labels",
    "selectors",
    "namespace",
    "setname",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub labels: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,
}

/// Transformations a kustomization applies to its package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct KustomizationSpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name_suffix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub common_namespace: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub common_labels: IndexMap<String, Option<String>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub common_selectors: IndexMap<String, Option<String>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub common_annotations: IndexMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_map_generator: Vec<ConfigMapArgs>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NameMapping {
    pub api: String,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KustomizationStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_mappings: Vec<NameMapping>,
}

/// A `kustomization.yaml` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Kustomization {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: KustomizationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<KustomizationStatus>,
}

impl Kustomization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: KUSTOMIZATION_API_VERSION.to_string(),
            kind: KUSTOMIZATION_KIND.to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            spec: KustomizationSpec::default(),
            status: None,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let kustomization: Kustomization = serde_yaml::from_str(yaml)?;
        if kustomization.kind != KUSTOMIZATION_KIND {
            return Err(EngineError::InvalidConfig {
                kind: "kustomization".to_string(),
                message: format!(
                    "expected kind {}, found {}",
                    KUSTOMIZATION_KIND, kustomization.kind
                ),
            });
        }
        Ok(kustomization)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Runs every transformation of one kustomization over its package
#[derive(Debug, Clone)]
pub struct KustomizationFilter {
    pub kustomization: Kustomization,
    /// Directory holding the kustomization file; generator files resolve here
    pub root: PathBuf,
    tables: Arc<FieldSpecTables>,
}

impl KustomizationFilter {
    pub fn new(
        kustomization: Kustomization,
        root: impl Into<PathBuf>,
        tables: Arc<FieldSpecTables>,
    ) -> Self {
        Self {
            kustomization,
            root: root.into(),
            tables,
        }
    }

    fn is_self(&self, node: &Node) -> bool {
        node.kind() == Some(KUSTOMIZATION_KIND)
            && node.name() == Some(self.kustomization.metadata.name.as_str())
    }

    /// The sub-filters in [`FILTER_ORDER`], ending with `set_name`
    fn chain<'a>(&self, set_name: &'a mut SetNameFilter) -> Vec<Box<dyn Filter + 'a>> {
        let name = self.kustomization.metadata.name.clone();
        let spec = &self.kustomization.spec;
        let tables = &self.tables;

        vec![
            Box::new(ResetNameFilter::new(Arc::clone(tables), name.clone())),
            Box::new(ConfigMapGeneratorFilter::new(
                spec.config_map_generator.clone(),
                self.root.clone(),
                name,
            )),
            Box::new(PatchFilter::new(spec.patches.clone())),
            Box::new(FieldMapFilter::annotations(
                tables,
                spec.common_annotations.clone(),
            )),
            Box::new(FieldMapFilter::labels(tables, spec.common_labels.clone())),
            Box::new(FieldMapFilter::selectors(
                tables,
                spec.common_selectors.clone(),
            )),
            Box::new(NamespaceFilter::new(tables, spec.common_namespace.clone())),
            Box::new(set_name),
        ]
    }

    fn run_chain(&self, nodes: Vec<Node>) -> kform_core::Result<(Vec<Node>, Vec<NameMapping>)> {
        let spec = &self.kustomization.spec;
        let mut set_name = SetNameFilter::new(
            Arc::clone(&self.tables),
            self.kustomization.metadata.name.clone(),
            spec.name_prefix.clone(),
            spec.name_suffix.clone(),
        );

        let mut nodes = nodes;
        for (mut filter, stage) in self.chain(&mut set_name).into_iter().zip(FILTER_ORDER) {
            tracing::debug!(
                stage,
                filter = filter.name(),
                "kustomization {}",
                self.kustomization.metadata.name
            );
            nodes = filter.filter(nodes)?;
        }

        let mut mappings: Vec<NameMapping> = set_name
            .mappings()
            .iter()
            .map(|(key, new_name)| NameMapping {
                api: key.kind.clone(),
                name: key.name.clone(),
                new_name: new_name.clone(),
            })
            .collect();
        mappings.sort_by(|a, b| {
            (&a.name, &a.api, &a.new_name).cmp(&(&b.name, &b.api, &b.new_name))
        });
        Ok((nodes, mappings))
    }
}

impl Filter for KustomizationFilter {
    fn filter(&mut self, nodes: Vec<Node>) -> kform_core::Result<Vec<Node>> {
        if self.kustomization.metadata.name.is_empty() {
            return Err(EngineError::MissingName.into());
        }

        let mut input = Vec::new();
        let mut keep = Vec::new();
        let mut self_index = None;
        for mut node in nodes {
            if self.is_self(&node) {
                node.clear("status");
                node.set_annotation(LOCAL_CONFIG_ANNOTATION, "true")?;
                self_index = Some(keep.len());
                keep.push(node);
            } else if is_local_config(&node.get_meta()?) {
                keep.push(node);
            } else {
                input.push(node);
            }
        }

        let (mut output, mappings) = self.run_chain(input)?;

        if let Some(index) = self_index.filter(|_| !mappings.is_empty()) {
            let status = KustomizationStatus {
                name_mappings: mappings,
            };
            let value: Value = serde_yaml::to_value(&status).map_err(CoreError::from)?;
            keep[index].set("status", value, true)?;
        }

        output.extend(keep);
        Ok(output)
    }

    fn name(&self) -> &str {
        "kustomization"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kform_core::kio::{parse_documents, render_documents};

    fn filter(yaml: &str) -> KustomizationFilter {
        KustomizationFilter::new(
            Kustomization::from_yaml(yaml).unwrap(),
            ".",
            FieldSpecTables::builtin().unwrap(),
        )
    }

    const KUSTOMIZATION: &str = r#"
apiVersion: kustomize.io/v1alpha1
kind: BlueprintKustomization
metadata:
  name: app
spec:
  namePrefix: p-
  commonNamespace: prod
  commonLabels:
    env: prod
  patches:
  - target:
      kind: Deployment
    patch:
      spec:
        replicas: 3
"#;

    #[test]
    fn test_parse_kustomization() {
        let k = Kustomization::from_yaml(KUSTOMIZATION).unwrap();
        assert_eq!(k.metadata.name, "app");
        assert_eq!(k.spec.name_prefix, "p-");
        assert_eq!(k.spec.common_labels.get("env"), Some(&Some("prod".to_string())));
        assert_eq!(k.spec.patches.len(), 1);
    }

    #[test]
    fn test_rejects_other_kinds() {
        let err = Kustomization::from_yaml("apiVersion: v1\nkind: ConfigMap\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_missing_name_fails_before_running() {
        let mut f = filter("apiVersion: kustomize.io/v1alpha1\nkind: BlueprintKustomization\nspec:\n  namePrefix: p-\n");
        let nodes = parse_documents("kind: A\nmetadata:\n  name: a\n").unwrap();
        let err = f.filter(nodes).unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn test_full_chain_with_status() {
        let mut f = filter(KUSTOMIZATION);
        let mut input = parse_documents(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: tool-config
  annotations:
    config.kubernetes.io/local-config: "true"
"#,
        )
        .unwrap();
        input.push(Node::from_yaml(KUSTOMIZATION).unwrap());

        let output = f.filter(input).unwrap();
        let kinds: Vec<_> = output.iter().map(|n| n.kind().unwrap()).collect();
        assert_eq!(kinds, vec!["Deployment", "ConfigMap", "BlueprintKustomization"]);

        let deploy = &output[0];
        assert_eq!(deploy.name(), Some("p-web"));
        assert_eq!(deploy.get("metadata.namespace").unwrap(), "prod");
        assert_eq!(deploy.get("metadata.labels.env").unwrap(), "prod");
        assert_eq!(deploy.get("spec.template.metadata.labels.env").unwrap(), "prod");
        assert_eq!(deploy.get("spec.replicas").and_then(Value::as_i64), Some(3));

        // control documents are left alone
        assert_eq!(output[1].name(), Some("tool-config"));
        assert!(output[1].get("metadata.namespace").is_none());

        let own = &output[2];
        assert_eq!(own.annotation(LOCAL_CONFIG_ANNOTATION), Some("true"));
        let status: KustomizationStatus =
            Node::new(own.get("status").unwrap().clone()).unmarshal().unwrap();
        assert_eq!(
            status.name_mappings,
            vec![NameMapping {
                api: "Deployment".into(),
                name: "web".into(),
                new_name: "p-web".into(),
            }]
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let mut f = filter(KUSTOMIZATION);
        let mut input = parse_documents(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n",
        )
        .unwrap();
        input.push(Node::from_yaml(KUSTOMIZATION).unwrap());

        let once = f.filter(input).unwrap();
        let twice = f.filter(once.clone()).unwrap();
        assert_eq!(render_documents(&once).unwrap(), render_documents(&twice).unwrap());
    }

    #[test]
    fn test_status_sorted() {
        let mut f = filter(KUSTOMIZATION);
        let mut input = parse_documents(
            "kind: Service\nmetadata:\n  name: b\n---\nkind: ConfigMap\nmetadata:\n  name: b\n---\nkind: Service\nmetadata:\n  name: a\n",
        )
        .unwrap();
        input.push(Node::from_yaml(KUSTOMIZATION).unwrap());
        let output = f.filter(input).unwrap();

        let status: KustomizationStatus = Node::new(output[3].get("status").unwrap().clone())
            .unmarshal()
            .unwrap();
        let order: Vec<_> = status
            .name_mappings
            .iter()
            .map(|m| (m.name.as_str(), m.api.as_str()))
            .collect();
        assert_eq!(order, vec![("a", "Service"), ("b", "ConfigMap"), ("b", "Service")]);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = Kustomization::from_yaml(
            "apiVersion: kustomize.io/v1alpha1\nkind: BlueprintKustomization\nmetadata:\n  name: app\nspec:\n  commonLabel:\n    env: prod\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Yaml(_)));
        assert!(err.to_string().contains("commonLabel"), "{err}");

        let err = Kustomization::from_yaml(
            "apiVersion: kustomize.io/v1alpha1\nkind: BlueprintKustomization\nmetadata:\n  name: app\nspec:\n  patches:\n  - target:\n      kinds: Deployment\n    patch: {}\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Yaml(_)));
    }

    #[test]
    fn test_accepts_written_back_metadata() {
        let k = Kustomization::from_yaml(
            "apiVersion: kustomize.io/v1alpha1\nkind: BlueprintKustomization\nmetadata:\n  name: app\n  annotations:\n    config.kubernetes.io/local-config: \"true\"\nstatus:\n  nameMappings:\n  - api: Service\n    name: web\n    newName: p-web\n",
        )
        .unwrap();
        assert_eq!(
            k.metadata.annotations.get(LOCAL_CONFIG_ANNOTATION).map(String::as_str),
            Some("true")
        );
        assert_eq!(k.status.unwrap().name_mappings.len(), 1);
    }

    #[test]
    fn test_chain_follows_filter_order() {
        let f = filter(KUSTOMIZATION);
        let mut set_name = SetNameFilter::new(FieldSpecTables::builtin().unwrap(), "app", "", "");
        let names: Vec<String> = f
            .chain(&mut set_name)
            .iter()
            .map(|filter| filter.name().to_string())
            .collect();
        assert_eq!(names, FILTER_ORDER);
    }

    #[test]
    fn test_common_fields_run_after_patches_and_rename_last() {
        let mut f = filter(
            r#"
apiVersion: kustomize.io/v1alpha1
kind: BlueprintKustomization
metadata:
  name: app
spec:
  namePrefix: p-
  commonNamespace: prod
  commonLabels:
    env: prod
  patches:
  - target:
      name: web
      namespace: staging
    patch:
      metadata:
        labels:
          env: dev
          tier: web
"#,
        );
        let input = parse_documents(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  namespace: staging\n",
        )
        .unwrap();

        let output = f.filter(input).unwrap();
        let deploy = &output[0];
        assert_eq!(deploy.name(), Some("p-web"));
        assert_eq!(deploy.get("metadata.namespace").unwrap(), "prod");
        assert_eq!(deploy.get("metadata.labels.env").unwrap(), "prod");
        assert_eq!(deploy.get("metadata.labels.tier").unwrap(), "web");
    }

    #[test]
    fn test_no_status_without_renames() {
        let yaml = "apiVersion: kustomize.io/v1alpha1\nkind: BlueprintKustomization\nmetadata:\n  name: app\nspec:\n  commonLabels:\n    env: prod\n";
        let mut f = filter(yaml);
        let mut own = Node::from_yaml(yaml).unwrap();
        own.set(
            "status",
            serde_yaml::from_str("nameMappings:\n- api: Service\n  name: web\n  newName: p-web\n")
                .unwrap(),
            true,
        )
        .unwrap();

        let output = f.filter(vec![own]).unwrap();
        assert!(output[0].get("status").is_none());
        assert!(!render_documents(&output).unwrap().contains("status"));
    }
}
