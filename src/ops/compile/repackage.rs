//! Build the binary gem and move it to the output directory.

use std::path::Path;

use crate::core::package::GemPackage;
use crate::core::platform::RubyHost;
use crate::core::spec::GemSpec;
use crate::ops::compile::CompileError;
use crate::util::fs::move_file;

/// Stamp the RubyGems version, build `<full_name>.gem` inside `gem_dir` and
/// move it into `output_dir`. Returns the file name of the new gem.
pub fn repackage(
    spec: &mut GemSpec,
    gem_dir: &Path,
    output_dir: &Path,
    host: &RubyHost,
) -> Result<String, CompileError> {
    spec.rubygems_version = Some(host.rubygems_version.to_string());

    let file_name = GemPackage::build(spec, gem_dir).map_err(CompileError::RepackagingFailed)?;

    let built = gem_dir.join(&file_name);
    let target = output_dir.join(&file_name);
    move_file(&built, &target).map_err(CompileError::io(format!(
        "failed to move {} to {}",
        built.display(),
        output_dir.display()
    )))?;

    tracing::debug!("wrote {}", target.display());
    Ok(file_name)
}
