//! mkmf builder for `extconf.rb` entry points.

use std::path::Path;

use crate::builder::{make_command, ruby_command, BuildFailure, BuildLog, ExtensionContext};
use crate::util::config::ToolchainSettings;

pub fn handles(file_name: &str) -> bool {
    file_name.starts_with("extconf")
}

/// `ruby extconf.rb`, then `make` and `make install` into the destination.
pub fn build(
    entry: &Path,
    ctx: &ExtensionContext<'_>,
    settings: &ToolchainSettings,
    log: &mut BuildLog,
) -> Result<(), BuildFailure> {
    let script = entry.file_name().unwrap_or(entry.as_os_str());
    log.run(ruby_command(ctx).arg(script), &ctx.ext_dir)?;

    if !ctx.ext_dir.join("Makefile").exists() {
        log.note(&format!("{} did not create a Makefile", entry.display()));
        return Err(log.failure());
    }

    let dest = install_vars(&ctx.dest_dir);
    log.run(make_command(settings).args(&dest), &ctx.ext_dir)?;
    log.run(
        make_command(settings)
            .arg("install")
            .args(&dest)
            .arg("DESTDIR="),
        &ctx.ext_dir,
    )
}

fn install_vars(dest: &Path) -> [String; 2] {
    [
        format!("sitearchdir={}", dest.display()),
        format!("sitelibdir={}", dest.display()),
    ]
}
