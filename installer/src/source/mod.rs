//! Source acquisition for the build.
//!
//! A build needs a directory containing the package's sources. It can come
//! from four places:
//!
//! - the release archive named by the formula URL, downloaded into a
//!   cache and verified against the pinned SHA-256 before unpacking;
//! - a local copy of that archive (`--archive`), verified the same way;
//! - a shallow clone of the formula's `[head]` branch (`--head`);
//! - an existing local checkout (`--source-dir`).
//!
//! Archive sources require a pinned checksum. A formula still carrying
//! the placeholder refuses archive installs with
//! [`InstallerError::ChecksumUnpinned`].

pub mod download;
pub mod error;
pub mod extraction;
pub mod verification;

pub use error::FetchError;

use crate::error::{InstallerError, Result};
use crate::git;
use crate::receipt::SourceOrigin;
use camino::{Utf8Path, Utf8PathBuf};
use download::SourceDownloader;
use log::{debug, info, warn};
use netrain_formula::PackageDescriptor;
use netrain_formula::checksum::Sha256Digest;
use std::path::PathBuf;
use tempfile::TempDir;

/// Which source the user asked to build from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    /// The formula's release archive.
    Release,
    /// A local copy of the release archive.
    Archive(Utf8PathBuf),
    /// The formula's development branch.
    Head,
    /// An existing source checkout.
    Directory(Utf8PathBuf),
}

/// A source directory ready to build, plus where it came from.
///
/// Trees unpacked or cloned into a temporary directory keep that directory
/// alive until the tree is dropped.
#[derive(Debug)]
pub struct SourceTree {
    dir: Utf8PathBuf,
    origin: SourceOrigin,
    _workdir: Option<TempDir>,
}

impl SourceTree {
    /// Directory containing the package manifest.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Where the tree came from, for the install receipt.
    #[must_use]
    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }
}

/// Resolves a [`SourceRequest`] into a [`SourceTree`].
pub struct SourceFetcher<'a> {
    downloader: &'a dyn SourceDownloader,
    cache_dir: Utf8PathBuf,
}

impl<'a> SourceFetcher<'a> {
    /// Create a fetcher that caches release archives under `cache_dir`.
    #[must_use]
    pub fn new(downloader: &'a dyn SourceDownloader, cache_dir: Utf8PathBuf) -> Self {
        Self {
            downloader,
            cache_dir,
        }
    }

    /// Acquire the sources for `descriptor` as requested.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ChecksumUnpinned`] for archive requests
    /// against an unpinned formula, [`InstallerError::Fetch`] for download,
    /// checksum, or extraction failures, and [`InstallerError::Git`] when
    /// cloning the head branch fails.
    pub fn fetch(
        &self,
        descriptor: &PackageDescriptor,
        request: &SourceRequest,
    ) -> Result<SourceTree> {
        match request {
            SourceRequest::Release => self.fetch_release(descriptor),
            SourceRequest::Archive(path) => {
                let digest = pinned_digest(descriptor)?;
                verification::verify_archive(path.as_std_path(), digest)?;
                unpack(path, SourceOrigin::Archive {
                    location: path.to_string(),
                    sha256: digest.to_string(),
                })
            }
            SourceRequest::Head => clone_head(descriptor),
            SourceRequest::Directory(path) => local_tree(path),
        }
    }

    fn fetch_release(&self, descriptor: &PackageDescriptor) -> Result<SourceTree> {
        let digest = pinned_digest(descriptor)?;
        let archive = self.cached_archive_path(descriptor);

        if archive.is_file() {
            match verification::verify_archive(archive.as_std_path(), digest) {
                Ok(()) => info!("using cached {archive}"),
                Err(err) => {
                    warn!("discarding cached archive: {err}");
                    std::fs::remove_file(&archive).map_err(FetchError::from)?;
                }
            }
        }

        if !archive.is_file() {
            std::fs::create_dir_all(&self.cache_dir).map_err(FetchError::from)?;
            info!("downloading {}", descriptor.url());
            self.downloader
                .download(descriptor.url(), archive.as_std_path())?;
            if let Err(err) = verification::verify_archive(archive.as_std_path(), digest) {
                let _ = std::fs::remove_file(&archive);
                return Err(err.into());
            }
        }

        unpack(&archive, SourceOrigin::Archive {
            location: descriptor.url().to_owned(),
            sha256: digest.to_string(),
        })
    }

    fn cached_archive_path(&self, descriptor: &PackageDescriptor) -> Utf8PathBuf {
        self.cache_dir
            .join(format!("{}-{}.tar.gz", descriptor.name(), descriptor.version()))
    }
}

fn pinned_digest(descriptor: &PackageDescriptor) -> Result<&Sha256Digest> {
    descriptor
        .checksum()
        .digest()
        .ok_or_else(|| InstallerError::ChecksumUnpinned {
            package: descriptor.name().to_owned(),
        })
}

fn unpack(archive: &Utf8Path, origin: SourceOrigin) -> Result<SourceTree> {
    let workdir = source_workdir()?;
    let count = extraction::extract_tarball(archive.as_std_path(), workdir.path())?;
    let root = utf8(extraction::source_root(workdir.path())?)?;
    debug!("unpacked {count} entries from {archive} into {root}");
    Ok(SourceTree {
        dir: root,
        origin,
        _workdir: Some(workdir),
    })
}

fn clone_head(descriptor: &PackageDescriptor) -> Result<SourceTree> {
    let head = descriptor.head().ok_or_else(|| FetchError::NoHeadSource {
        package: descriptor.name().to_owned(),
    })?;
    let workdir = source_workdir()?;
    let target = utf8(workdir.path().join(descriptor.name()))?;
    info!("cloning {} ({})", head.url, head.branch);
    git::clone_branch(&head.url, &head.branch, &target)?;
    Ok(SourceTree {
        dir: target,
        origin: SourceOrigin::Head {
            url: head.url.clone(),
            branch: head.branch.clone(),
        },
        _workdir: Some(workdir),
    })
}

fn local_tree(path: &Utf8Path) -> Result<SourceTree> {
    if !path.join("Cargo.toml").is_file() {
        return Err(FetchError::NotASourceTree {
            path: path.as_std_path().to_path_buf(),
            reason: "no Cargo.toml found".to_owned(),
        }
        .into());
    }
    Ok(SourceTree {
        dir: path.to_owned(),
        origin: SourceOrigin::Local {
            path: path.to_owned(),
        },
        _workdir: None,
    })
}

fn source_workdir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("netrain-src-")
        .tempdir()
        .map_err(|e| FetchError::from(e).into())
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path).map_err(|e| {
        FetchError::Io(std::io::Error::other(format!(
            "source path is not valid UTF-8: {e}"
        )))
        .into()
    })
}
