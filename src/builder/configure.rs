//! autoconf-style `configure` entry points.

use std::path::Path;

use crate::builder::{make_command, BuildFailure, BuildLog, ExtensionContext};
use crate::util::config::ToolchainSettings;
use crate::util::process::ProcessBuilder;

pub fn handles(file_name: &str) -> bool {
    file_name.starts_with("configure")
}

/// `sh ./configure --prefix=DEST` unless a Makefile already exists, then
/// `make` and `make install`.
pub fn build(
    entry: &Path,
    ctx: &ExtensionContext<'_>,
    settings: &ToolchainSettings,
    log: &mut BuildLog,
) -> Result<(), BuildFailure> {
    if !ctx.ext_dir.join("Makefile").exists() {
        let script = entry
            .file_name()
            .map(|name| format!("./{}", name.to_string_lossy()))
            .unwrap_or_else(|| "./configure".to_string());
        log.run(
            ProcessBuilder::new("sh")
                .arg(script)
                .arg(format!("--prefix={}", ctx.dest_dir.display())),
            &ctx.ext_dir,
        )?;
    }

    log.run(make_command(settings), &ctx.ext_dir)?;
    log.run(make_command(settings).arg("install"), &ctx.ext_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_host;
    use tempfile::TempDir;

    #[test]
    fn test_handles() {
        assert!(handles("configure"));
        assert!(handles("configure.sh"));
        assert!(!handles("CMakeLists.txt"));
    }

    #[test]
    #[cfg(unix)]
    fn test_configure_failure_stops_build() {
        let tmp = TempDir::new().unwrap();
        let ext = tmp.path().join("ext/foo");
        std::fs::create_dir_all(&ext).unwrap();
        std::fs::write(ext.join("configure"), "echo 'checking for gcc... no'\nexit 1\n").unwrap();

        let host = fake_host();
        let ctx = ExtensionContext::new(tmp.path(), "ext/foo/configure", &host);
        let mut log = BuildLog::default();

        let err = build(&ext.join("configure"), &ctx, &ToolchainSettings::default(), &mut log)
            .unwrap_err();
        assert!(err.output.contains("checking for gcc... no"));
        assert!(!err.output.contains("install"));
    }
}
