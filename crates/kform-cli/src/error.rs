//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use kform_core::CoreError;
use kform_engine::EngineError;
use kform_fn::FnError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid kustomization, field spec or function declaration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kform::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A function could not be run or failed
    #[error("Function error: {message}")]
    #[diagnostic(code(kform::cli::function))]
    Function {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Package could not be read or written back
    #[error("Package error: {message}")]
    #[diagnostic(code(kform::cli::package))]
    Package { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kform::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(kform::cli::usage))]
    Usage { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Function { .. } => exit_codes::FUNCTION_ERROR,
            CliError::Package { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

fn help_of(diagnostic: &dyn Diagnostic) -> Option<String> {
    diagnostic.help().map(|help| help.to_string())
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            CoreError::Filter { filter, source } => {
                // Filters box their own error types; recover them to pick the exit code.
                match source.downcast::<EngineError>() {
                    Ok(engine) => (*engine).into(),
                    Err(source) => match source.downcast::<FnError>() {
                        Ok(function) => (*function).into(),
                        Err(source) => CliError::Package {
                            message: format!("{}: {}", filter, source),
                        },
                    },
                }
            }
            CoreError::InvalidFieldSpec { .. }
            | CoreError::InvalidPatch { .. }
            | CoreError::MergeConflict { .. } => CliError::config(err.to_string()),
            other => CliError::Package {
                message: other.to_string(),
            },
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(inner) => inner.into(),
            EngineError::FileAccess { .. } => CliError::Package {
                message: err.to_string(),
            },
            other => CliError::Config {
                help: help_of(&other),
                message: other.to_string(),
            },
        }
    }
}

impl From<FnError> for CliError {
    fn from(err: FnError) -> Self {
        match err {
            FnError::Core(inner) => inner.into(),
            FnError::Io(e) => e.into(),
            FnError::InvalidFunctionSpec { .. } | FnError::InvalidMount { .. } => {
                CliError::config(err.to_string())
            }
            other => CliError::Function {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
