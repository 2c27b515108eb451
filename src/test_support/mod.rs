//! Test utilities for gem-compiler unit tests.
//!
//! This module provides fixtures for the pieces of the pipeline that
//! normally need a real Ruby installation: a fake host description and a
//! scripted extension toolchain. Gem archives are baked with [`GemFixture`].
//!
//! # Example
//!
//! ```rust,ignore
//! use gem_compiler::test_support::{fake_host, FakeToolchain, GemFixture};
//!
//! #[test]
//! fn test_example() {
//!     let tmp = tempfile::TempDir::new().unwrap();
//!     let gemfile = GemFixture::with_extension("oj", "3.16.1").build(tmp.path());
//!     let toolchain = FakeToolchain::producing(&["lib/oj/oj.so"]);
//!
//!     // Compile `gemfile` with `fake_host()` and `toolchain`...
//! }
//! ```

pub mod fixtures;

use std::cell::RefCell;
use std::path::PathBuf;

use crate::builder::{BuildFailure, ExtensionContext, ExtensionToolchain};
use crate::core::platform::RubyHost;
use crate::core::version::GemVersion;

// Re-export fixtures for convenience
pub use fixtures::*;

/// A Linux x86_64 host running Ruby 3.3.4 with RubyGems 3.5.11.
pub fn fake_host() -> RubyHost {
    RubyHost {
        ruby: PathBuf::from("ruby"),
        ruby_version: GemVersion::parse("3.3.4").unwrap(),
        abi_version: "3.3.0".to_string(),
        major: 3,
        minor: 3,
        teeny: 4,
        rubygems_version: GemVersion::parse("3.5.11").unwrap(),
        platform: "x86_64-linux".to_string(),
        os: "linux".to_string(),
        dlext: "so".to_string(),
        strip: None,
    }
}

/// Extension toolchain that writes predefined files instead of compiling.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    /// Files created (relative to the gem directory) by every build.
    outputs: Vec<String>,
    /// Files deleted (relative to the gem directory) by every build.
    removes: Vec<String>,
    /// When set, every build fails with this output.
    failure: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeToolchain {
    /// A toolchain whose builds produce `outputs`.
    pub fn producing(outputs: &[&str]) -> Self {
        FakeToolchain {
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Also delete `paths` during each build, like a `make clean` step would.
    pub fn removing(mut self, paths: &[&str]) -> Self {
        self.removes = paths.iter().map(|s| s.to_string()).collect();
        self
    }

    /// A toolchain whose builds fail with `output`.
    pub fn failing(output: impl Into<String>) -> Self {
        FakeToolchain {
            failure: Some(output.into()),
            ..Default::default()
        }
    }

    /// Extensions built so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ExtensionToolchain for FakeToolchain {
    fn build(&self, extension: &str, ctx: &ExtensionContext<'_>) -> Result<(), BuildFailure> {
        self.calls.borrow_mut().push(extension.to_string());

        if let Some(output) = &self.failure {
            return Err(BuildFailure {
                output: output.clone(),
            });
        }

        for output in &self.outputs {
            let path = ctx.gem_dir.join(output);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, b"\x7fELF").unwrap();
        }
        for removed in &self.removes {
            std::fs::remove_file(ctx.gem_dir.join(removed)).unwrap();
        }
        Ok(())
    }
}
