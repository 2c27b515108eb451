//! Core data structures for gem-compiler.
//!
//! This module contains the foundational types used throughout the crate:
//! - Gem versions and requirements
//! - Gem specifications and archives
//! - The host Ruby platform
//! - The temporary workspace

pub mod package;
pub mod platform;
pub mod spec;
pub mod version;
pub mod workspace;

pub use package::GemPackage;
pub use platform::{PlatformFamily, RubyHost};
pub use spec::GemSpec;
pub use version::{GemVersion, Requirement};
pub use workspace::TempWorkspace;
