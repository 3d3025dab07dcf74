//! Error types for function orchestration

use kform_core::CoreError;
use thiserror::Error;

/// Result type for function operations
pub type Result<T> = std::result::Result<T, FnError>;

/// Errors raised while discovering or running functions
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FnError {
    /// Function needs network access but the run does not grant it
    #[error("function {function} requires network access\nHint: pass --network to allow it")]
    NetworkRequired { function: String },

    /// No enabled backend can run the function
    #[error("no enabled backend can run function {function}")]
    UnsupportedFunction { function: String },

    /// The function annotation could not be parsed
    #[error("invalid function spec on {resource}: {message}")]
    InvalidFunctionSpec { resource: String, message: String },

    /// The function process exited with a failure status
    #[error("function {function} failed with status {status}: {stderr}")]
    ExecutionFailed {
        function: String,
        status: i32,
        stderr: String,
    },

    /// The function wrote something that is not a resource stream
    #[error("function {function} produced invalid output: {message}")]
    InvalidOutput { function: String, message: String },

    /// A storage mount flag could not be parsed
    #[error("invalid storage mount '{mount}': {message}")]
    InvalidMount { mount: String, message: String },

    /// Error from the core pipeline
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error while talking to a function process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FnError> for CoreError {
    fn from(e: FnError) -> Self {
        match e {
            FnError::Core(inner) => inner,
            other => CoreError::filter("function", other),
        }
    }
}
