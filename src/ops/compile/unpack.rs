//! Open a gem, check it can and should be compiled here, and extract it.

use std::path::{Path, PathBuf};

use crate::core::package::GemPackage;
use crate::core::platform::RubyHost;
use crate::ops::compile::CompileError;
use crate::util::shell::{Shell, Status};

/// A gem extracted into the workspace.
#[derive(Debug)]
pub struct Unpacked {
    /// The opened archive; its specification is the original one.
    pub package: GemPackage,
    /// `<workspace>/<gem file name without .gem>`
    pub gem_dir: PathBuf,
}

/// Validate the gem against the host and extract it under `workspace_root`.
///
/// Checks run in order: Ruby version, RubyGems version, platform, then the
/// presence of extensions. Nothing is extracted when a check fails.
pub fn unpack(
    gemfile: &Path,
    workspace_root: &Path,
    host: &RubyHost,
    shell: &Shell,
) -> Result<Unpacked, CompileError> {
    let basename = gem_basename(gemfile);
    shell.status(
        Status::Unpacking,
        format!("gem: '{}' in temporary directory...", basename),
    );

    let package = GemPackage::open(gemfile).map_err(CompileError::Archive)?;
    let spec = package.spec();

    if !spec.required_ruby_version.is_satisfied_by(&host.ruby_version) {
        return Err(CompileError::UnmetRuntimeRequirement {
            name: spec.name.clone(),
            requirement: spec.required_ruby_version.to_string(),
            current: host.ruby_version.to_string(),
        });
    }

    if !spec
        .required_rubygems_version
        .is_satisfied_by(&host.rubygems_version)
    {
        return Err(CompileError::UnmetToolingRequirement {
            name: spec.name.clone(),
            requirement: spec.required_rubygems_version.to_string(),
            current: host.rubygems_version.to_string(),
        });
    }

    if !spec.is_source() {
        tracing::debug!("{} has platform {}", spec.name, spec.platform);
        return Err(CompileError::AlreadyCompiled);
    }

    if spec.extensions.is_empty() {
        return Err(CompileError::NoExtensions);
    }

    let gem_dir = workspace_root.join(&basename);
    package
        .extract_files(&gem_dir)
        .map_err(CompileError::Archive)?;
    tracing::debug!("extracted {} into {}", gemfile.display(), gem_dir.display());

    Ok(Unpacked { package, gem_dir })
}

/// File name of the gem without a trailing `.gem`.
fn gem_basename(gemfile: &Path) -> String {
    let name = gemfile
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".gem") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}
