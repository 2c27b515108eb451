//! Filesystem utilities.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

/// Move a file, falling back to copy + remove when a rename is not possible
/// (typically across filesystems).
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                "rename {} -> {} failed ({}), copying instead",
                src.display(),
                dst.display(),
                rename_err
            );
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

/// Path of `path` relative to `base`, with `/` separators.
pub fn relative_slash_path(base: &Path, path: &Path) -> String {
    let rel = pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf());
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every file under `dir` (recursive) whose extension is `ext`, as paths
/// relative to `base`. Symlinks count when they point at a file, so
/// `libfoo.so -> libfoo.so.1.2` is found; symlinked directories are not
/// descended into.
///
/// A missing `dir` yields nothing.
pub fn files_with_extension(base: &Path, dir: &Path, ext: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if !dir.is_dir() {
        return found;
    }

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        let file_type = entry.file_type();
        if !(file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())) {
            continue;
        }
        if entry.path().extension().is_some_and(|e| e == ext) {
            found.insert(relative_slash_path(base, entry.path()));
        }
    }

    found
}

/// Glob match options: `*` stays within one path segment, `**` spans many.
pub const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Files matching a glob pattern relative to `base`, as relative paths.
pub fn glob_relative(base: &Path, pattern: &str) -> Result<BTreeSet<String>> {
    let full = format!(
        "{}/{}",
        Pattern::escape(&base.to_string_lossy()),
        pattern.trim_start_matches("./")
    );

    let mut results = BTreeSet::new();
    for entry in glob::glob_with(&full, GLOB_OPTIONS)
        .with_context(|| format!("invalid glob pattern: {}", pattern))?
    {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    results.insert(relative_slash_path(base, &path));
                }
            }
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    Ok(results)
}

/// Whether a relative path would resolve outside of its base directory.
pub fn escapes_base(path: &str) -> bool {
    Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
