//! gem-compiler - build the native extensions of a source gem and repackage
//! it as a binary gem for the host platform.
//!
//! This crate provides the core library functionality for gem-compiler,
//! including gem archive handling, extension building and the compile
//! pipeline.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and fixtures for gem-compiler unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides gem fixtures, a fake host and a scripted
/// extension toolchain.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{GemPackage, GemSpec, RubyHost, TempWorkspace};
pub use ops::compile::{CompileError, CompileOptions, Compiler, Outcome};
pub use util::context::GlobalContext;
