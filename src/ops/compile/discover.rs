//! Find what the extension build produced.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::platform::RubyHost;
use crate::core::spec::GemSpec;
use crate::ops::compile::{ArtifactRule, CompileError, CompileOptions};
use crate::util::fs::{escapes_base, files_with_extension, glob_relative, GLOB_OPTIONS};

/// Paths of build outputs relative to the gem directory, with `/` separators.
pub type Artifacts = BTreeSet<String>;

/// Collect artifacts in three stages, each overriding the previous:
///
/// 1. files with the host `DLEXT` under every require path,
/// 2. linkable shared libraries under the shared directory, if configured,
/// 3. the artifact rules, in order.
pub fn discover(
    spec: &GemSpec,
    gem_dir: &Path,
    host: &RubyHost,
    options: &CompileOptions,
) -> Result<Artifacts, CompileError> {
    let mut artifacts = Artifacts::new();

    for require_path in &spec.require_paths {
        if escapes_base(require_path) {
            tracing::warn!("ignoring require path outside the gem: {}", require_path);
            continue;
        }
        artifacts.extend(files_with_extension(
            gem_dir,
            &gem_dir.join(require_path),
            &host.dlext,
        ));
    }

    if let Some(shared_dir) = &options.include_shared_dir {
        if escapes_base(shared_dir) {
            return Err(CompileError::InvalidArtifactRule {
                rule: shared_dir.clone(),
                reason: "the shared directory must stay inside the gem".to_string(),
            });
        }
        artifacts.extend(files_with_extension(
            gem_dir,
            &gem_dir.join(shared_dir),
            host.shared_lib_ext(),
        ));
    }

    for rule in &options.artifacts {
        apply_rule(&mut artifacts, gem_dir, rule)?;
    }

    Ok(artifacts)
}

fn apply_rule(
    artifacts: &mut Artifacts,
    gem_dir: &Path,
    rule: &ArtifactRule,
) -> Result<(), CompileError> {
    let pattern = rule.compile()?;

    if rule.include {
        let matched = glob_relative(gem_dir, &rule.pattern).map_err(|e| {
            CompileError::InvalidArtifactRule {
                rule: rule.to_string(),
                reason: format!("{:#}", e),
            }
        })?;
        tracing::debug!("{} matched {} file(s)", rule, matched.len());
        artifacts.extend(matched);
    } else {
        artifacts.retain(|path| !pattern.matches_with(path, GLOB_OPTIONS));
    }

    Ok(())
}
