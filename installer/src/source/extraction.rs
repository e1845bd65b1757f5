//! Source tarball extraction.
//!
//! Unpacks `.tar.gz` archives with path traversal protection and locates
//! the source root, which release tarballs wrap in one top-level
//! directory such as `netrain-0.2.0/`.

use super::error::FetchError;
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};

/// Extract the gzip-compressed tarball at `archive_path` into `dest_dir`.
///
/// Returns the number of entries unpacked.
///
/// # Errors
///
/// Returns [`FetchError::PathTraversal`] if any entry attempts to escape
/// `dest_dir`, [`FetchError::EmptyArchive`] if there are no entries, and
/// [`FetchError::Io`] on I/O failures.
pub fn extract_tarball(archive_path: &Path, dest_dir: &Path) -> Result<usize, FetchError> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut extracted = 0usize;

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        entry.unpack(&dest_path)?;
        extracted += 1;
    }

    if extracted == 0 {
        return Err(FetchError::EmptyArchive);
    }

    Ok(extracted)
}

/// Return the directory holding the sources inside `dest_dir`.
///
/// If extraction produced exactly one top-level directory, that directory
/// is the root; otherwise `dest_dir` itself is.
///
/// # Errors
///
/// Returns [`FetchError::Io`] if `dest_dir` cannot be listed.
pub fn source_root(dest_dir: &Path) -> Result<PathBuf, FetchError> {
    let entries = std::fs::read_dir(dest_dir)?.collect::<Result<Vec<_>, _>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(dest_dir.to_path_buf()),
    }
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), FetchError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(FetchError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
