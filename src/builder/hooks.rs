//! Pre-build hooks.
//!
//! Hooks run in registration order after the gem is unpacked and before any
//! extension is built. A hook that rejects the gem aborts the compile.

use std::path::Path;

use thiserror::Error;

use crate::core::spec::GemSpec;
use crate::util::process::{ExitReason, ProcessBuilder};

/// A hook refused to let the build proceed.
#[derive(Debug, Error)]
#[error("pre-build hook `{hook}` rejected {gem}: {reason}")]
pub struct HookRejection {
    pub hook: String,
    pub gem: String,
    pub reason: String,
}

/// Runs before extensions are built.
pub trait PreBuildHook {
    /// Name used in messages.
    fn name(&self) -> String;

    /// Inspect or prepare the unpacked gem.
    fn run(&self, spec: &GemSpec, gem_dir: &Path) -> Result<(), HookRejection>;
}

/// A hook that runs a command line in the gem directory.
///
/// The command sees `GEM_NAME`, `GEM_VERSION` and `GEM_DIR` in its
/// environment. A non-zero exit rejects the gem with the command's output.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: String,
}

impl CommandHook {
    pub fn new(command: impl Into<String>) -> Self {
        CommandHook {
            command: command.into(),
        }
    }
}

impl PreBuildHook for CommandHook {
    fn name(&self) -> String {
        self.command.clone()
    }

    fn run(&self, spec: &GemSpec, gem_dir: &Path) -> Result<(), HookRejection> {
        let reject = |reason: String| HookRejection {
            hook: self.command.clone(),
            gem: spec.full_name(),
            reason,
        };

        let cmd = ProcessBuilder::from_command_line(&self.command)
            .map_err(|e| reject(format!("{:#}", e)))?
            .env("GEM_NAME", &spec.name)
            .env("GEM_VERSION", spec.version.to_string())
            .env("GEM_DIR", gem_dir.display().to_string())
            .cwd(gem_dir);

        let result = cmd.exec_combined().map_err(|e| reject(format!("{:#}", e)))?;
        if result.status.success() {
            return Ok(());
        }

        let mut reason = ExitReason::from_status(&result.status).to_string();
        let output = result.output.trim_end();
        if !output.is_empty() {
            reason.push('\n');
            reason.push_str(output);
        }
        Err(reject(reason))
    }
}

/// Hooks for a list of configured command lines.
pub fn command_hooks(commands: &[String]) -> Vec<Box<dyn PreBuildHook>> {
    commands
        .iter()
        .map(|c| Box::new(CommandHook::new(c.clone())) as Box<dyn PreBuildHook>)
        .collect()
}
