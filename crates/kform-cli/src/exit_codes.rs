//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Configuration error - invalid kustomization, field spec or function declaration
pub const CONFIG_ERROR: i32 = 2;

/// Function error - a function could not run or failed
pub const FUNCTION_ERROR: i32 = 3;

/// Package error - unreadable package, bad provenance, unwritable resources
pub const PACKAGE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
