//! Engine error types

use kform_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while configuring or running resource filters
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("kustomization must specify metadata.name")]
    #[diagnostic(
        code(kform::kustomization::missing_name),
        help("add `metadata: {{name: <name>}}` to the kustomization document")
    )]
    MissingName,

    #[error("invalid {kind}: {message}")]
    #[diagnostic(code(kform::config::invalid))]
    InvalidConfig { kind: String, message: String },

    #[error("configMapGenerator '{generator}': invalid literal '{literal}'")]
    #[diagnostic(
        code(kform::generator::literal),
        help("literals take the form KEY=VALUE")
    )]
    InvalidLiteral { generator: String, literal: String },

    #[error("configMapGenerator '{generator}': invalid key '{key}'")]
    #[diagnostic(
        code(kform::generator::key),
        help("keys may only contain alphanumerics, '-', '_' and '.'")
    )]
    InvalidKey { generator: String, key: String },

    #[error("cannot access '{path}': {message}")]
    #[diagnostic(code(kform::generator::file))]
    FileAccess { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(code(kform::core))]
    Core(#[from] CoreError),

    #[error("YAML error: {0}")]
    #[diagnostic(code(kform::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(inner) => inner,
            other => CoreError::filter("kustomize", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
