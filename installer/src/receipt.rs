//! Install receipts.
//!
//! The receipt is the only thing that marks a prefix as a completed
//! install. It is written last, replaced atomically, and never appended
//! to, so re-installing yields exactly one receipt.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use netrain_formula::{BuildDependency, PackageDescriptor};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Where the installed source tree came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceOrigin {
    /// A release archive verified against the formula checksum.
    Archive {
        /// Archive URL or local path.
        location: String,
        /// Verified SHA-256 digest.
        sha256: String,
    },
    /// A clone of the development branch.
    Head {
        /// Repository URL.
        url: String,
        /// Branch that was cloned.
        branch: String,
    },
    /// A local source directory.
    Local {
        /// Directory that was built.
        path: Utf8PathBuf,
    },
}

/// Registration record for one installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Source the binary was built from.
    pub source: SourceOrigin,
    /// Absolute path to the installed binary.
    pub artifact: Utf8PathBuf,
    /// Dependencies declared at install time.
    pub dependencies: Vec<BuildDependency>,
}

impl InstallReceipt {
    /// Build a receipt for `descriptor` installed at `artifact`.
    #[must_use]
    pub fn new(descriptor: &PackageDescriptor, source: SourceOrigin, artifact: &Utf8Path) -> Self {
        Self {
            name: descriptor.name().to_owned(),
            version: descriptor.version().to_owned(),
            source,
            artifact: artifact.to_owned(),
            dependencies: descriptor.dependencies().iter().cloned().collect(),
        }
    }

    /// Atomically write the receipt to `path`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Receipt`] if serialisation or the write fails.
    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        let receipt_error = |reason: String| InstallerError::Receipt {
            path: path.to_owned(),
            reason,
        };
        let dir = path
            .parent()
            .ok_or_else(|| receipt_error("receipt path has no parent".to_owned()))?;
        let json = serde_json::to_string_pretty(self).map_err(|e| receipt_error(e.to_string()))?;

        let mut file =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| receipt_error(e.to_string()))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|e| receipt_error(e.to_string()))?;
        file.persist(path)
            .map_err(|e| receipt_error(e.error.to_string()))?;
        Ok(())
    }

    /// Read the receipt at `path`, returning `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Receipt`] if the file exists but cannot be
    /// read or parsed.
    pub fn read(path: &Utf8Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(InstallerError::Receipt {
                    path: path.to_owned(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| InstallerError::Receipt {
                path: path.to_owned(),
                reason: e.to_string(),
            })
    }
}
