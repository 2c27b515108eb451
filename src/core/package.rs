//! Gem archive reading and writing.
//!
//! A `.gem` file is a plain tar archive with three members:
//! - `metadata.gz`: the gzipped YAML specification
//! - `data.tar.gz`: the gzipped tarball of the gem's files
//! - `checksums.yaml.gz`: SHA256/SHA512 digests of the two above

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256, Sha512};
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;

use crate::core::spec::{GemSpec, SpecError};
#[cfg(unix)]
use crate::util::fs::normalize_path;

const METADATA_ENTRY: &str = "metadata.gz";
const DATA_ENTRY: &str = "data.tar.gz";
const CHECKSUMS_ENTRY: &str = "checksums.yaml.gz";

/// Error reading or writing a gem archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("`{}` is not a valid gem: missing {entry}", path.display())]
    MissingEntry { path: PathBuf, entry: &'static str },

    #[error("`{}` has invalid metadata", path.display())]
    Spec {
        path: PathBuf,
        #[source]
        source: SpecError,
    },

    #[error("gem entry escapes the destination directory: {0}")]
    UnsafePath(String),

    #[error("gem entry `{entry}` links outside the destination directory: {target}")]
    UnsafeLink { entry: String, target: String },
}

fn io_err(context: impl Into<String>) -> impl FnOnce(io::Error) -> ArchiveError {
    let context = context.into();
    move |source| ArchiveError::Io { context, source }
}

/// An opened gem archive.
#[derive(Debug, Clone)]
pub struct GemPackage {
    path: PathBuf,
    spec: GemSpec,
}

impl GemPackage {
    /// Open a gem file and read its specification.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)
            .map_err(io_err(format!("failed to open gem `{}`", path.display())))?;
        let mut archive = Archive::new(file);
        let read_err = || io_err(format!("failed to read gem `{}`", path.display()));

        for entry in archive.entries().map_err(read_err())? {
            let entry = entry.map_err(read_err())?;
            if entry_name(&entry.path().map_err(read_err())?) != METADATA_ENTRY {
                continue;
            }

            let mut yaml = String::new();
            GzDecoder::new(entry)
                .read_to_string(&mut yaml)
                .map_err(read_err())?;

            let spec = GemSpec::from_yaml(&yaml).map_err(|source| ArchiveError::Spec {
                path: path.to_path_buf(),
                source,
            })?;

            return Ok(GemPackage {
                path: path.to_path_buf(),
                spec,
            });
        }

        Err(ArchiveError::MissingEntry {
            path: path.to_path_buf(),
            entry: METADATA_ENTRY,
        })
    }

    pub fn spec(&self) -> &GemSpec {
        &self.spec
    }

    /// Extract the gem's files into `dest`.
    pub fn extract_files(&self, dest: &Path) -> Result<(), ArchiveError> {
        let file = File::open(&self.path)
            .map_err(io_err(format!("failed to open gem `{}`", self.path.display())))?;
        let mut archive = Archive::new(file);
        let read_err = || io_err(format!("failed to read gem `{}`", self.path.display()));

        for entry in archive.entries().map_err(read_err())? {
            let entry = entry.map_err(read_err())?;
            if entry_name(&entry.path().map_err(read_err())?) != DATA_ENTRY {
                continue;
            }
            return extract_data(GzDecoder::new(entry), dest);
        }

        Err(ArchiveError::MissingEntry {
            path: self.path.clone(),
            entry: DATA_ENTRY,
        })
    }

    /// Build a gem from `spec` using the files under `dir`.
    ///
    /// The archive is written into `dir` and its file name is returned.
    /// Manifest entries without a backing file stay in the metadata but are
    /// not archived.
    pub fn build(spec: &GemSpec, dir: &Path) -> Result<String, ArchiveError> {
        let mtime = source_date_epoch();

        let yaml = spec.to_yaml().map_err(|source| ArchiveError::Spec {
            path: dir.to_path_buf(),
            source,
        })?;
        let metadata = gzip(yaml.as_bytes()).map_err(io_err("failed to compress gem metadata"))?;
        let data = build_data(spec, dir, mtime)?;
        let checksums = gzip(checksums_yaml(&metadata, &data).as_bytes())
            .map_err(io_err("failed to compress gem checksums"))?;

        let file_name = spec.file_name();
        let out_path = dir.join(&file_name);
        let write_err = || io_err(format!("failed to write gem `{}`", out_path.display()));

        let out = File::create(&out_path).map_err(write_err())?;
        let mut builder = Builder::new(out);
        for (name, bytes) in [
            (METADATA_ENTRY, &metadata),
            (DATA_ENTRY, &data),
            (CHECKSUMS_ENTRY, &checksums),
        ] {
            let mut header = Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o444);
            header.set_mtime(mtime);
            builder
                .append_data(&mut header, name, bytes.as_slice())
                .map_err(write_err())?;
        }
        builder
            .into_inner()
            .and_then(|mut f| f.flush())
            .map_err(write_err())?;

        tracing::debug!("built {}", out_path.display());
        Ok(file_name)
    }
}

fn entry_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Join an archive entry path onto `dest`, rejecting anything that could
/// land outside of it.
fn safe_join(dest: &Path, entry: &Path) -> Result<PathBuf, ArchiveError> {
    let mut out = dest.to_path_buf();
    for component in entry.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(ArchiveError::UnsafePath(entry.display().to_string())),
        }
    }
    Ok(out)
}

fn extract_data(data: impl Read, dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = Archive::new(data);
    let read_err = || io_err("failed to read gem data");

    fs::create_dir_all(dest)
        .map_err(io_err(format!("failed to create directory: {}", dest.display())))?;
    let root = dest
        .canonicalize()
        .map_err(io_err(format!("failed to resolve directory: {}", dest.display())))?;

    for entry in archive.entries().map_err(read_err())? {
        let mut entry = entry.map_err(read_err())?;
        let entry_path = entry.path().map_err(read_err())?.into_owned();
        let output_path = safe_join(&root, &entry_path)?;

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Symlink => {
                let target = entry.link_name().map_err(read_err())?.map(|t| t.into_owned());
                if let Some(target) = target {
                    extract_symlink(&root, &entry_path, &output_path, &target)?;
                }
            }
            EntryType::Directory
            | EntryType::Regular
            | EntryType::Continuous
            | EntryType::Link => {
                // unpack_in refuses to write through links that leave `root`
                let unpacked = entry.unpack_in(&root).map_err(io_err(format!(
                    "failed to extract file: {}",
                    output_path.display()
                )))?;
                if !unpacked {
                    return Err(ArchiveError::UnsafePath(entry_path.display().to_string()));
                }
            }
            _ => {
                tracing::debug!(
                    "Skipping unsupported entry type {:?}: {}",
                    entry_type,
                    entry_path.display()
                );
            }
        }
    }

    Ok(())
}

/// Create a symlink entry, refusing targets that resolve outside `root`.
#[cfg(unix)]
fn extract_symlink(
    root: &Path,
    entry_path: &Path,
    link: &Path,
    target: &Path,
) -> Result<(), ArchiveError> {
    let unsafe_link = || ArchiveError::UnsafeLink {
        entry: entry_path.display().to_string(),
        target: target.display().to_string(),
    };

    if target.has_root() {
        return Err(unsafe_link());
    }

    let (Some(parent), Some(name)) = (link.parent(), link.file_name()) else {
        return Err(ArchiveError::UnsafePath(entry_path.display().to_string()));
    };
    fs::create_dir_all(parent)
        .map_err(io_err(format!("failed to create directory: {}", parent.display())))?;
    let parent = parent
        .canonicalize()
        .map_err(io_err(format!("failed to resolve directory: {}", parent.display())))?;
    if !parent.starts_with(root) {
        return Err(ArchiveError::UnsafePath(entry_path.display().to_string()));
    }
    if !normalize_path(&parent.join(target)).starts_with(root) {
        return Err(unsafe_link());
    }

    let link = parent.join(name);
    std::os::unix::fs::symlink(target, &link)
        .map_err(io_err(format!("failed to create symlink: {}", link.display())))?;

    // Lexically inside can still resolve outside through earlier links.
    if let Ok(resolved) = link.canonicalize() {
        if !resolved.starts_with(root) {
            let _ = fs::remove_file(&link);
            return Err(unsafe_link());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn extract_symlink(
    _root: &Path,
    entry_path: &Path,
    _link: &Path,
    _target: &Path,
) -> Result<(), ArchiveError> {
    tracing::debug!("Skipping symlink: {}", entry_path.display());
    Ok(())
}

fn build_data(spec: &GemSpec, dir: &Path, mtime: u64) -> Result<Vec<u8>, ArchiveError> {
    let write_err = || io_err("failed to write gem data");
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for file in &spec.files {
        let src = dir.join(file);
        let meta = match fs::symlink_metadata(&src) {
            Ok(meta) => meta,
            Err(_) => {
                tracing::warn!("`{}` is listed in the gemspec but missing, not packaged", file);
                continue;
            }
        };

        let mut header = Header::new_gnu();
        header.set_mtime(mtime);

        if meta.file_type().is_symlink() {
            let target = fs::read_link(&src)
                .map_err(io_err(format!("failed to read symlink: {}", src.display())))?;
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder
                .append_link(&mut header, file, &target)
                .map_err(write_err())?;
        } else if meta.is_file() {
            header.set_size(meta.len());
            header.set_mode(file_mode(&meta));
            let reader = File::open(&src)
                .map_err(io_err(format!("failed to read file: {}", src.display())))?;
            builder
                .append_data(&mut header, file, reader)
                .map_err(write_err())?;
        }
    }

    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(write_err())
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn checksums_yaml(metadata: &[u8], data: &[u8]) -> String {
    let mut sums: BTreeMap<&str, BTreeMap<&str, String>> = BTreeMap::new();
    for (name, bytes) in [(METADATA_ENTRY, metadata), (DATA_ENTRY, data)] {
        sums.entry("SHA256")
            .or_default()
            .insert(name, hex::encode(Sha256::digest(bytes)));
        sums.entry("SHA512")
            .or_default()
            .insert(name, hex::encode(Sha512::digest(bytes)));
    }
    // A map of strings always serializes.
    format!("---\n{}", serde_yaml::to_string(&sums).unwrap_or_default())
}

/// Honour `SOURCE_DATE_EPOCH` for reproducible archives.
fn source_date_epoch() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
}
