//! rake and mkrf builders.

use std::path::{Path, PathBuf};

use crate::builder::{ruby_command, BuildFailure, BuildLog, ExtensionContext};
use crate::util::config::ToolchainSettings;
use crate::util::process::{find_rake, ProcessBuilder};

pub fn handles(file_name: &str) -> bool {
    file_name.eq_ignore_ascii_case("rakefile") || file_name.starts_with("mkrf_conf")
}

/// Run `mkrf_conf*` first when that is the entry point, then rake with the
/// install directories set.
pub fn build(
    entry: &Path,
    ctx: &ExtensionContext<'_>,
    settings: &ToolchainSettings,
    log: &mut BuildLog,
) -> Result<(), BuildFailure> {
    let is_mkrf = entry
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("mkrf_conf"));

    if is_mkrf {
        let script = entry.file_name().unwrap_or(entry.as_os_str());
        log.run(ruby_command(ctx).arg(script), &ctx.ext_dir)?;
    }

    let dest = ctx.dest_dir.display().to_string();
    let rake = find_rake(settings.rake.as_deref()).unwrap_or_else(|| PathBuf::from("rake"));
    let cmd = ProcessBuilder::new(rake)
        .arg(format!("RUBYARCHDIR={}", dest))
        .arg(format!("RUBYLIBDIR={}", dest))
        .env("RUBYARCHDIR", &dest)
        .env("RUBYLIBDIR", &dest);

    log.run(cmd, &ctx.ext_dir)
}
