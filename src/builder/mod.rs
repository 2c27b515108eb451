//! Native extension building.
//!
//! Every extension entry point declared by a gem is handed to an
//! [`ExtensionToolchain`]. The default toolchain, [`RubyToolchain`], picks a
//! builder by the entry point's file name and drives the external tools
//! (ruby, make, rake, sh, cmake) in the extension's directory, installing
//! the results into the gem's `lib` directory.

pub mod cmake;
pub mod configure;
pub mod extconf;
pub mod hooks;
pub mod rake;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::platform::RubyHost;
use crate::core::spec::GemSpec;
use crate::util::config::ToolchainSettings;
use crate::util::process::{ExitReason, ProcessBuilder};
use crate::util::shell::{Shell, Status};

pub use hooks::{CommandHook, HookRejection, PreBuildHook};

/// A failed extension build. The message is the accumulated build log.
#[derive(Debug, Error)]
#[error("{output}")]
pub struct BuildFailure {
    pub output: String,
}

/// Failure of the extension build stage.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    HookRejected(#[from] HookRejection),

    #[error(transparent)]
    Failed(#[from] BuildFailure),
}

/// Where and for whom an extension is built.
#[derive(Debug, Clone)]
pub struct ExtensionContext<'a> {
    /// Root of the unpacked gem.
    pub gem_dir: &'a Path,
    /// Directory containing the extension entry point.
    pub ext_dir: PathBuf,
    /// Install destination for built libraries (`<gem_dir>/lib`).
    pub dest_dir: PathBuf,
    pub host: &'a RubyHost,
}

impl<'a> ExtensionContext<'a> {
    pub fn new(gem_dir: &'a Path, extension: &str, host: &'a RubyHost) -> Self {
        let entry = gem_dir.join(extension);
        let ext_dir = entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| gem_dir.to_path_buf());
        ExtensionContext {
            gem_dir,
            ext_dir,
            dest_dir: gem_dir.join("lib"),
            host,
        }
    }
}

/// Builds one native extension.
pub trait ExtensionToolchain {
    /// Build the extension whose entry point is `extension` (relative to the
    /// gem directory).
    fn build(&self, extension: &str, ctx: &ExtensionContext<'_>) -> Result<(), BuildFailure>;
}

type BuilderFn =
    fn(&Path, &ExtensionContext<'_>, &ToolchainSettings, &mut BuildLog) -> Result<(), BuildFailure>;

/// Entry point file name predicates and the builder handling them.
const BUILDERS: &[(fn(&str) -> bool, BuilderFn)] = &[
    (extconf::handles, extconf::build),
    (configure::handles, configure::build),
    (rake::handles, rake::build),
    (cmake::handles, cmake::build),
];

/// The standard Ruby extension toolchain.
#[derive(Debug, Clone, Default)]
pub struct RubyToolchain {
    settings: ToolchainSettings,
}

impl RubyToolchain {
    pub fn new(settings: ToolchainSettings) -> Self {
        RubyToolchain { settings }
    }
}

impl ExtensionToolchain for RubyToolchain {
    fn build(&self, extension: &str, ctx: &ExtensionContext<'_>) -> Result<(), BuildFailure> {
        let entry = ctx.gem_dir.join(extension);
        let file_name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some((_, builder)) = BUILDERS.iter().find(|(matches, _)| matches(&file_name)) else {
            return Err(BuildFailure {
                output: format!("No builder for extension '{}'", extension),
            });
        };

        std::fs::create_dir_all(&ctx.dest_dir).map_err(|e| BuildFailure {
            output: format!("failed to create {}: {}", ctx.dest_dir.display(), e),
        })?;

        let mut log = BuildLog::default();
        builder(&entry, ctx, &self.settings, &mut log)
    }
}

/// Run pre-build hooks, then build every declared extension in order.
pub fn build_extensions(
    spec: &GemSpec,
    gem_dir: &Path,
    host: &RubyHost,
    toolchain: &dyn ExtensionToolchain,
    hooks: &[Box<dyn PreBuildHook>],
    shell: &Shell,
) -> Result<(), BuildError> {
    for hook in hooks {
        tracing::debug!("running pre-build hook {}", hook.name());
        shell.verbose(Status::Running, format!("pre-build hook `{}`", hook.name()));
        hook.run(spec, gem_dir)?;
    }

    for extension in &spec.extensions {
        shell.status(Status::Compiling, format!("extension {}", extension));
        let ctx = ExtensionContext::new(gem_dir, extension, host);
        toolchain.build(extension, &ctx)?;
    }

    Ok(())
}

/// Accumulated transcript of the commands run for one extension.
#[derive(Debug, Default)]
pub struct BuildLog {
    text: String,
}

impl BuildLog {
    /// Run a step in `dir`, appending its command line and output.
    ///
    /// A spawn failure or an unsuccessful exit ends the build with the log so
    /// far as the failure message.
    pub fn run(&mut self, cmd: ProcessBuilder, dir: &Path) -> Result<(), BuildFailure> {
        let cmd = cmd.cwd(dir);
        self.text
            .push_str(&format!("current directory: {}\n", dir.display()));
        self.text.push_str(&cmd.display_command());
        self.text.push('\n');

        match cmd.exec_combined() {
            Ok(result) => {
                self.text.push_str(&result.output);
                if result.status.success() {
                    Ok(())
                } else {
                    tracing::debug!(
                        "`{}` failed with {}",
                        cmd.display_command(),
                        ExitReason::from_status(&result.status)
                    );
                    Err(self.failure())
                }
            }
            Err(e) => {
                self.text.push_str(&format!("{:#}\n", e));
                Err(self.failure())
            }
        }
    }

    /// Append a line of text.
    pub fn note(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// End the build with the log so far.
    pub fn failure(&self) -> BuildFailure {
        BuildFailure {
            output: self.text.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// The Ruby interpreter to run build scripts with.
pub(crate) fn ruby_command(ctx: &ExtensionContext<'_>) -> ProcessBuilder {
    ProcessBuilder::new(&ctx.host.ruby)
}

/// `make` with the configured program and job count.
pub(crate) fn make_command(settings: &ToolchainSettings) -> ProcessBuilder {
    let make = crate::util::process::find_make(settings.make.as_deref())
        .unwrap_or_else(|| PathBuf::from("make"));
    let cmd = ProcessBuilder::new(make);
    match settings.jobs {
        Some(jobs) => cmd.env("MAKEFLAGS", format!("-j{}", jobs)),
        None => cmd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_host;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let tmp = TempDir::new().unwrap();
        let host = fake_host();
        let ctx = ExtensionContext::new(tmp.path(), "ext/foo/extconf.rb", &host);

        assert_eq!(ctx.ext_dir, tmp.path().join("ext/foo"));
        assert_eq!(ctx.dest_dir, tmp.path().join("lib"));
    }

    #[test]
    fn test_builder_table() {
        let pick = |name: &str| BUILDERS.iter().position(|(matches, _)| matches(name));

        assert_eq!(pick("extconf.rb"), Some(0));
        assert_eq!(pick("configure"), Some(1));
        assert_eq!(pick("Rakefile"), Some(2));
        assert_eq!(pick("mkrf_conf.rb"), Some(2));
        assert_eq!(pick("CMakeLists.txt"), Some(3));
        assert_eq!(pick("build.rs"), None);
    }

    #[test]
    fn test_unknown_entry_point() {
        let tmp = TempDir::new().unwrap();
        let host = fake_host();
        let ctx = ExtensionContext::new(tmp.path(), "ext/foo/build.sh", &host);

        let err = RubyToolchain::default()
            .build("ext/foo/build.sh", &ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "No builder for extension 'ext/foo/build.sh'");
    }

    #[test]
    #[cfg(unix)]
    fn test_build_log_records_steps() {
        let tmp = TempDir::new().unwrap();
        let mut log = BuildLog::default();

        log.run(ProcessBuilder::new("sh").args(["-c", "echo configured"]), tmp.path())
            .unwrap();
        let err = log
            .run(ProcessBuilder::new("sh").args(["-c", "echo oops 1>&2; exit 2"]), tmp.path())
            .unwrap_err();

        let expected = format!(
            "current directory: {dir}\nsh -c echo configured\nconfigured\n\
             current directory: {dir}\nsh -c echo oops 1>&2; exit 2\noops\n",
            dir = tmp.path().display()
        );
        assert_eq!(err.output, expected);
    }

    #[test]
    fn test_build_log_spawn_failure() {
        let tmp = TempDir::new().unwrap();
        let mut log = BuildLog::default();

        let err = log
            .run(ProcessBuilder::new("gem-compiler-no-such-tool"), tmp.path())
            .unwrap_err();
        assert!(err.output.contains("failed to execute `gem-compiler-no-such-tool`"));
    }
}
