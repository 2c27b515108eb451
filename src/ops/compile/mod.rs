//! Implementation of `gem-compiler compile`.
//!
//! The pipeline runs in a fixed order:
//! unpack → build extensions → discover artifacts → strip → reconcile the
//! file manifest → rewrite metadata → repackage. Everything happens inside a
//! temporary workspace that is removed on every exit path.

pub mod discover;
pub mod reconcile;
pub mod repackage;
pub mod rewrite;
pub mod strip;
pub mod unpack;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::builder::{self, BuildError, ExtensionToolchain, HookRejection, PreBuildHook};
use crate::core::package::ArchiveError;
use crate::core::platform::RubyHost;
use crate::core::version::VersionError;
use crate::core::workspace::TempWorkspace;
use crate::util::fs::escapes_base;
use crate::util::shell::{Shell, Status};

pub use discover::{discover, Artifacts};
pub use reconcile::reconcile;
pub use repackage::repackage;
pub use rewrite::rewrite;
pub use strip::strip_artifacts;
pub use unpack::{unpack, Unpacked};

/// Errors that can occur while compiling a gem.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{name} requires Ruby version {requirement}. The current ruby version is {current}.")]
    UnmetRuntimeRequirement {
        name: String,
        requirement: String,
        current: String,
    },

    #[error(
        "{name} requires RubyGems version {requirement}. The current RubyGems version is {current}. \
         Try 'gem update --system' to update RubyGems itself."
    )]
    UnmetToolingRequirement {
        name: String,
        requirement: String,
        current: String,
    },

    #[error("The gem file seems to be compiled already. Skipping.")]
    AlreadyCompiled,

    #[error("There are no extensions to build on this gem file. Skipping.")]
    NoExtensions,

    #[error("{0}")]
    ExtensionBuildFailed(String),

    #[error(transparent)]
    HookRejected(#[from] HookRejection),

    #[error("{command} failed{detail}")]
    ExternalCommandFailed { command: String, detail: String },

    #[error("There was a problem building the gem.")]
    RepackagingFailed(#[source] ArchiveError),

    #[error("Please specify a gem file on the command line (e.g. gem-compiler compile foo-0.1.0.gem)")]
    MissingInputArgument,

    #[error("invalid artifact rule `{rule}`: {reason}")]
    InvalidArtifactRule { rule: String, reason: String },

    #[error("output directory `{}` does not exist", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("invalid host version: {0}")]
    HostVersion(#[from] VersionError),

    #[error(transparent)]
    Archive(ArchiveError),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl CompileError {
    /// The skip this error stands for, if it is one.
    pub fn skip(&self) -> Option<Skip> {
        match self {
            CompileError::AlreadyCompiled => Some(Skip::AlreadyCompiled),
            CompileError::NoExtensions => Some(Skip::NoExtensions),
            _ => None,
        }
    }

    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> CompileError {
        let context = context.into();
        move |source| CompileError::Io { context, source }
    }
}

impl From<BuildError> for CompileError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::HookRejected(rejection) => CompileError::HookRejected(rejection),
            BuildError::Failed(failure) => CompileError::ExtensionBuildFailed(failure.output),
        }
    }
}

/// Why a gem was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// The gem is already platform specific.
    AlreadyCompiled,
    /// The gem declares no native extensions.
    NoExtensions,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::AlreadyCompiled => f.write_str("The gem file seems to be compiled already"),
            Skip::NoExtensions => f.write_str("There are no extensions to build on this gem file"),
        }
    }
}

/// Result of a compile that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Path of the new binary gem.
    Built(PathBuf),
    Skipped(Skip),
}

/// How `required_ruby_version` is locked in the compiled gem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbiLock {
    /// `~> <RbConfig ruby_version>`, e.g. `~> 3.3.0`
    #[default]
    Ruby,
    /// `~> MAJOR.MINOR.TEENY.0`
    Strict,
    /// Leave the requirement untouched.
    None,
}

impl FromStr for AbiLock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ruby" => Ok(AbiLock::Ruby),
            "strict" => Ok(AbiLock::Strict),
            "none" => Ok(AbiLock::None),
            _ => Err(format!(
                "invalid ABI lock '{}'; expected 'ruby', 'strict', or 'none'",
                s
            )),
        }
    }
}

impl fmt::Display for AbiLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbiLock::Ruby => "ruby",
            AbiLock::Strict => "strict",
            AbiLock::None => "none",
        })
    }
}

/// An include or exclude glob over files of the built gem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRule {
    pub include: bool,
    /// Glob relative to the gem directory.
    pub pattern: String,
}

impl ArtifactRule {
    pub fn include(pattern: impl Into<String>) -> Self {
        ArtifactRule {
            include: true,
            pattern: pattern.into(),
        }
    }

    pub fn exclude(pattern: impl Into<String>) -> Self {
        ArtifactRule {
            include: false,
            pattern: pattern.into(),
        }
    }

    /// Compile the pattern, rejecting anything that could match outside the
    /// gem directory.
    pub fn compile(&self) -> Result<glob::Pattern, CompileError> {
        let invalid = |reason: String| CompileError::InvalidArtifactRule {
            rule: self.to_string(),
            reason,
        };

        if self.pattern.is_empty() {
            return Err(invalid("empty pattern".to_string()));
        }
        if escapes_base(&self.pattern) {
            return Err(invalid(
                "patterns must be relative and stay inside the gem".to_string(),
            ));
        }
        glob::Pattern::new(&self.pattern).map_err(|e| invalid(e.to_string()))
    }
}

impl FromStr for ArtifactRule {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = match s.strip_prefix('!') {
            Some(pattern) => ArtifactRule::exclude(pattern.trim()),
            None => ArtifactRule::include(s.trim()),
        };
        rule.compile()?;
        Ok(rule)
    }
}

impl fmt::Display for ArtifactRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.include {
            f.write_str("!")?;
        }
        f.write_str(&self.pattern)
    }
}

/// Options for the compile command.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Directory the compiled gem is moved into
    pub output_dir: PathBuf,

    /// Directory (relative to the gem) searched for linkable shared libraries
    pub include_shared_dir: Option<String>,

    /// Extra include/exclude globs, applied in order
    pub artifacts: Vec<ArtifactRule>,

    /// Drop manifest entries whose file no longer exists
    pub prune: bool,

    /// Ruby ABI lock of the compiled gem
    pub abi_lock: AbiLock,

    /// Strip command line; `None` disables stripping
    pub strip: Option<String>,

    /// Base directory for the temporary workspace (None = system temp dir)
    pub temp_dir: Option<PathBuf>,
}

/// Drives the compile pipeline for one gem.
pub struct Compiler<'a> {
    host: &'a RubyHost,
    toolchain: &'a dyn ExtensionToolchain,
    hooks: Vec<Box<dyn PreBuildHook>>,
    shell: &'a Shell,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(
        host: &'a RubyHost,
        toolchain: &'a dyn ExtensionToolchain,
        shell: &'a Shell,
        options: CompileOptions,
    ) -> Self {
        Compiler {
            host,
            toolchain,
            hooks: Vec::new(),
            shell,
            options,
        }
    }

    /// Register pre-build hooks, run in the given order.
    pub fn with_hooks(mut self, hooks: Vec<Box<dyn PreBuildHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Compile `gemfile` into a binary gem in the output directory.
    pub fn compile(&self, gemfile: Option<&Path>) -> Result<Outcome, CompileError> {
        let gemfile = gemfile.ok_or(CompileError::MissingInputArgument)?;

        if !self.options.output_dir.is_dir() {
            return Err(CompileError::OutputDirMissing(self.options.output_dir.clone()));
        }
        for rule in &self.options.artifacts {
            rule.compile()?;
        }

        let workspace = match &self.options.temp_dir {
            Some(base) => TempWorkspace::acquire_in(base),
            None => TempWorkspace::acquire(),
        }
        .map_err(CompileError::io("failed to create temporary directory"))?;

        let result = self.run(gemfile, &workspace);
        workspace.release();

        match result {
            Err(err) => match err.skip() {
                Some(skip) => {
                    self.shell.status(Status::Skipped, format!("{}.", skip));
                    Ok(Outcome::Skipped(skip))
                }
                None => Err(err),
            },
            ok => ok,
        }
    }

    fn run(&self, gemfile: &Path, workspace: &TempWorkspace) -> Result<Outcome, CompileError> {
        let unpacked = unpack(gemfile, workspace.root(), self.host, self.shell)?;
        let original = unpacked.package.spec();
        let gem_dir = unpacked.gem_dir.as_path();

        builder::build_extensions(
            original,
            gem_dir,
            self.host,
            self.toolchain,
            &self.hooks,
            self.shell,
        )?;

        let artifacts = discover(original, gem_dir, self.host, &self.options)?;
        tracing::debug!("discovered {} artifact(s)", artifacts.len());

        strip_artifacts(
            &artifacts,
            gem_dir,
            self.options.strip.as_deref(),
            self.host,
            self.shell,
        )?;

        let mut spec = original.clone();
        reconcile(&mut spec, gem_dir, &artifacts, self.options.prune, self.shell);
        rewrite(&mut spec, self.host, self.options.abi_lock)?;

        self.shell.status(Status::Packaging, spec.file_name());
        let file_name = repackage(&mut spec, gem_dir, &self.options.output_dir, self.host)?;
        Ok(Outcome::Built(self.options.output_dir.join(file_name)))
    }
}
