//! Execution order of discovered functions
//!
//! Functions owned by deeper directories run first, so a package's own
//! functions see its resources before any enclosing package rewrites them.
//! Functions at the same depth run in directory path order; functions of one
//! directory keep their discovery order.

use std::cmp::Reverse;

use crate::scope::depth;
use crate::spec::FunctionDescriptor;

/// Sort descriptors deepest first, ties by directory path
pub fn sort_functions(functions: &mut [FunctionDescriptor]) {
    functions.sort_by_cached_key(|function| {
        let dir = function.dir();
        (Reverse(depth(&dir)), dir)
    });
}
