//! Temporary workspace for one compile invocation.
//!
//! The workspace is a uniquely named directory holding the unpacked gem and
//! everything the build writes next to it. It is removed exactly once: either
//! by an explicit [`TempWorkspace::release`] or when the guard is dropped, so
//! an early return or a panic in a later stage still cleans up.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const PREFIX: &str = "gem-compiler";

/// A temporary directory that is deleted when released or dropped.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl TempWorkspace {
    /// Create a fresh workspace in the system temporary directory.
    pub fn acquire() -> io::Result<Self> {
        Self::from_dir(tempfile::Builder::new().prefix(PREFIX).tempdir()?)
    }

    /// Create a fresh workspace under `base`.
    pub fn acquire_in(base: &Path) -> io::Result<Self> {
        Self::from_dir(tempfile::Builder::new().prefix(PREFIX).tempdir_in(base)?)
    }

    fn from_dir(dir: TempDir) -> io::Result<Self> {
        // Resolve short names and symlinks (e.g. /tmp -> /private/tmp) so paths
        // reported by build tools can be made relative to the root.
        let root = dir.path().canonicalize()?;
        tracing::debug!("created workspace {}", root.display());
        Ok(TempWorkspace {
            dir: Some(dir),
            root,
        })
    }

    /// Root directory of the workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete the workspace now.
    pub fn release(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => tracing::debug!("removed workspace {}", self.root.display()),
            Err(e) => tracing::warn!(
                "failed to remove temporary directory {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}
