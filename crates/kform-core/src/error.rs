//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("expected {expected} node, found {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{resource}: cannot update '{path}': {source}")]
    Setter {
        resource: String,
        path: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("cannot merge at '{path}': {message}")]
    MergeConflict { path: String, message: String },

    #[error("invalid patch: {message}")]
    InvalidPatch { message: String },

    #[error("invalid field spec '{path}': {message}")]
    InvalidFieldSpec { path: String, message: String },

    #[error("invalid provenance on {resource}: {message}")]
    InvalidProvenance { resource: String, message: String },

    #[error("cannot access '{path}': {message}")]
    FileAccess { path: String, message: String },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{filter}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoreError {
    /// Wrap an error raised by a higher-level filter
    pub fn filter(
        filter: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Filter {
            filter: filter.into(),
            source: source.into(),
        }
    }

    /// Whether this is a missing-path signal that callers may treat as a no-op
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::PathNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
