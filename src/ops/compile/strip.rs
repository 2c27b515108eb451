//! Strip debug symbols from built native libraries.

use std::path::Path;

use crate::core::platform::RubyHost;
use crate::ops::compile::{Artifacts, CompileError};
use crate::util::process::{ExitReason, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Run `strip_command` once per native artifact, with the artifact's path
/// appended. Returns the number of files stripped.
///
/// Only files with the host `DLEXT` or the shared library extension are
/// touched. The first failure aborts.
pub fn strip_artifacts(
    artifacts: &Artifacts,
    gem_dir: &Path,
    strip_command: Option<&str>,
    host: &RubyHost,
    shell: &Shell,
) -> Result<usize, CompileError> {
    let Some(strip_command) = strip_command else {
        return Ok(0);
    };

    shell.status(
        Status::Stripping,
        format!("symbols from extensions (using '{}')...", strip_command),
    );

    let base = ProcessBuilder::from_command_line(strip_command).map_err(|e| {
        CompileError::ExternalCommandFailed {
            command: "strip".to_string(),
            detail: format!(": {:#}", e),
        }
    })?;

    let mut stripped = 0;
    for artifact in artifacts.iter().filter(|a| is_native(a, host)) {
        let path = gem_dir.join(artifact);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.clone());
        let command = format!("strip {}", name);

        let result = base.clone().arg(&path).exec_combined().map_err(|e| {
            CompileError::ExternalCommandFailed {
                command: command.clone(),
                detail: format!(": {:#}", e),
            }
        })?;

        if !result.status.success() {
            tracing::debug!("{} output:\n{}", command, result.output);
            return Err(CompileError::ExternalCommandFailed {
                command,
                detail: format!(", {}", ExitReason::from_status(&result.status)),
            });
        }

        shell.verbose(Status::Stripped, &name);
        stripped += 1;
    }

    Ok(stripped)
}

fn is_native(artifact: &str, host: &RubyHost) -> bool {
    Path::new(artifact)
        .extension()
        .is_some_and(|ext| ext == host.dlext.as_str() || ext == host.shared_lib_ext())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_host;
    use crate::util::shell::Verbosity;
    use tempfile::TempDir;

    fn artifacts(paths: &[&str]) -> Artifacts {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_no_command_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let shell = Shell::capture(Verbosity::Verbose);
        let count = strip_artifacts(&artifacts(&["lib/a.so"]), tmp.path(), None, &fake_host(), &shell)
            .unwrap();
        assert_eq!(count, 0);
        assert!(shell.captured().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_strips_each_native_artifact_once() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("strip.log");
        let command = format!(r#"sh -c 'basename "$1" >> {}' sh"#, log.display());
        let shell = Shell::capture(Verbosity::Verbose);

        let count = strip_artifacts(
            &artifacts(&["lib/a.so", "lib/b/b.so", "vendor/helper.rb"]),
            tmp.path(),
            Some(&command),
            &fake_host(),
            &shell,
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "a.so\nb.so\n");
        let lines = shell.captured();
        assert!(lines[0].ends_with(&format!("Stripping symbols from extensions (using '{}')...", command)));
        assert_eq!(&lines[1..], ["    Stripped a.so", "    Stripped b.so"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_failure_reports_exit_code() {
        let tmp = TempDir::new().unwrap();
        let err = strip_artifacts(
            &artifacts(&["lib/a.so", "lib/b.so"]),
            tmp.path(),
            Some("false"),
            &fake_host(),
            &Shell::capture(Verbosity::Quiet),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "strip a.so failed, exit code 1");
    }

    #[test]
    fn test_missing_program_reports_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let err = strip_artifacts(
            &artifacts(&["lib/a.so"]),
            tmp.path(),
            Some("gem-compiler-no-such-strip -x"),
            &fake_host(),
            &Shell::capture(Verbosity::Quiet),
        )
        .unwrap_err();

        assert!(err.to_string().starts_with("strip a.so failed: "));
    }
}
