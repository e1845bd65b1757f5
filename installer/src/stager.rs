//! Install prefix layout and artifact staging.
//!
//! Builds never write straight into `<prefix>/bin`. The build tool installs
//! into a temporary staging root inside the prefix; only a successful build
//! is promoted into place. A failed build drops its staging root, so nothing
//! half-built ever becomes visible under the prefix.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use tempfile::TempDir;

/// Name of the registration record written after a successful install.
pub const RECEIPT_FILENAME: &str = "INSTALL_RECEIPT.json";

const STAGING_PREFIX: &str = ".staging-";

/// The binary produced by a completed install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    path: Utf8PathBuf,
}

impl InstalledArtifact {
    /// Wrap an absolute path to an installed binary.
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    /// Absolute path to the binary.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// A temporary build root inside the prefix. Removed on drop.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    root: Utf8PathBuf,
}

impl StagingArea {
    /// Path handed to the build tool as its install root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the build tool is expected to place `name`.
    #[must_use]
    pub fn staged_binary(&self, name: &str) -> Utf8PathBuf {
        self.root.join("bin").join(name)
    }

    /// Delete the staging root now rather than on drop.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while removing the directory.
    pub fn discard(self) -> Result<()> {
        self.dir.close().map_err(InstallerError::from)
    }
}

/// The directory a package is installed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPrefix {
    root: Utf8PathBuf,
}

impl InstallPrefix {
    /// Create a prefix rooted at `root`.
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Prefix root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `<prefix>/bin`.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join("bin")
    }

    /// `<prefix>/bin/<name>`.
    #[must_use]
    pub fn artifact_path(&self, name: &str) -> Utf8PathBuf {
        self.bin_dir().join(name)
    }

    /// `<prefix>/INSTALL_RECEIPT.json`.
    #[must_use]
    pub fn receipt_path(&self) -> Utf8PathBuf {
        self.root.join(RECEIPT_FILENAME)
    }

    /// Ensure the prefix exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PrefixUnavailable`] if the directory cannot
    /// be created or written to.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| InstallerError::PrefixUnavailable {
            reason: format!("cannot create {}: {e}", self.root),
        })?;

        let probe = tempfile::Builder::new()
            .prefix(".write-probe-")
            .tempfile_in(&self.root)
            .map_err(|e| InstallerError::PrefixUnavailable {
                reason: format!("{} is not writable: {e}", self.root),
            })?;
        drop(probe);
        Ok(())
    }

    /// Create a fresh staging root inside the prefix.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created, or
    /// [`InstallerError::PrefixUnavailable`] if its path is not UTF-8.
    pub fn staging_area(&self) -> Result<StagingArea> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)?;
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).map_err(|e| {
            InstallerError::PrefixUnavailable {
                reason: format!("staging path is not valid UTF-8: {e}"),
            }
        })?;
        debug!("staging build under {root}");
        Ok(StagingArea { dir, root })
    }

    /// Move the staged binary for `name` into `<prefix>/bin`.
    ///
    /// An existing binary at the destination is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::BuildFailed`] if the build left no binary
    /// in the staging root, or an I/O error if the move fails.
    pub fn promote(&self, staging: &StagingArea, name: &str) -> Result<InstalledArtifact> {
        let staged = staging.staged_binary(name);
        if !staged.is_file() {
            return Err(InstallerError::BuildFailed {
                package: name.to_owned(),
                reason: format!("build succeeded but did not produce {staged}"),
            });
        }

        fs::create_dir_all(self.bin_dir())?;
        let dest = self.artifact_path(name);
        fs::rename(&staged, &dest)?;
        debug!("promoted {staged} to {dest}");
        Ok(InstalledArtifact::new(dest))
    }

    /// Remove the receipt, marking the prefix as not installed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than "not found".
    pub fn unregister(&self) -> Result<()> {
        match fs::remove_file(self.receipt_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
