//! kform Fn - running external functions over a package
//!
//! This crate provides:
//! - **Discovery**: function declarations from annotations, `*.fn` files,
//!   function directories and explicit configs
//! - **Scoping**: functions only see resources under their own directory
//!   unless they are global
//! - **Ordering**: deepest directories first
//! - **Backends**: container images and local scripts speaking the
//!   `ResourceList` protocol on stdin/stdout

pub mod error;
pub mod filter;
pub mod order;
pub mod runfn;
pub mod runtime;
pub mod scope;
pub mod spec;

pub use error::{FnError, Result};
pub use filter::{ExecFilter, FunctionFilter};
pub use order::sort_functions;
pub use runfn::{FilterProvider, RunFns};
pub use runtime::{ContainerRuntime, Runtime, ScriptRuntime, StorageMount};
pub use scope::Scope;
pub use spec::{FunctionDescriptor, FunctionSpec};
