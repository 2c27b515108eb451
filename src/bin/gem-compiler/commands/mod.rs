//! Command implementations

pub mod compile;
pub mod completions;
pub mod host;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use gem_compiler::util::process::find_executable;
use gem_compiler::util::GlobalContext;

/// Pick the Ruby interpreter: command line, then configuration, then PATH.
pub fn resolve_ruby(ctx: &GlobalContext, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(ruby) = explicit.or(ctx.config().toolchain.ruby.as_deref()) {
        return Ok(ruby.to_path_buf());
    }

    match find_executable("ruby") {
        Some(ruby) => Ok(ruby),
        None => bail!(
            "Ruby interpreter not found\n\
             \n\
             gem-compiler builds extensions with the Ruby they will run on.\n\
             Put `ruby` on your PATH or pass --ruby <PATH>."
        ),
    }
}
