//! High-level operations.
//!
//! This module contains the implementation of gem-compiler commands.

pub mod compile;

pub use compile::{
    AbiLock, ArtifactRule, CompileError, CompileOptions, Compiler, Outcome, Skip,
};
