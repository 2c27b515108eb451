//! Bring the file manifest in line with the built gem.

use std::collections::HashSet;
use std::path::Path;

use crate::core::spec::GemSpec;
use crate::ops::compile::Artifacts;
use crate::util::shell::{Shell, Status};

/// De-duplicate the manifest, drop missing files when `prune` is set, and
/// append every artifact not yet listed.
///
/// Running it twice with the same inputs leaves the manifest unchanged.
pub fn reconcile(
    spec: &mut GemSpec,
    gem_dir: &Path,
    artifacts: &Artifacts,
    prune: bool,
    shell: &Shell,
) {
    let mut seen = HashSet::new();
    spec.files.retain(|file| seen.insert(file.clone()));

    if prune {
        spec.files.retain(|file| {
            let keep = gem_dir.join(file).exists();
            if !keep {
                tracing::debug!("pruning missing file {}", file);
            }
            keep
        });
    }

    for artifact in artifacts {
        if spec.add_file(artifact.clone()) {
            shell.verbose(Status::Adding, format!("'{}' to gemspec", artifact));
        }
    }
}
