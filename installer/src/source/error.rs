//! Errors raised while acquiring a source tree.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while downloading, verifying, or unpacking sources.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The release archive was not found (HTTP 404).
    #[error("source archive not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The archive digest does not match the formula.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        /// Archive that was hashed.
        path: PathBuf,
        /// Digest pinned in the formula.
        expected: String,
        /// Digest that was computed.
        actual: String,
    },

    /// An archive entry tries to escape the extraction directory.
    #[error("path traversal detected in archive entry: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: String,
    },

    /// The archive contains no entries.
    #[error("source archive is empty")]
    EmptyArchive,

    /// A local directory does not look like a buildable source tree.
    #[error("{} is not a source tree: {reason}", path.display())]
    NotASourceTree {
        /// Directory that was inspected.
        path: PathBuf,
        /// What was missing.
        reason: String,
    },

    /// `--head` was requested but the formula declares no head source.
    #[error("{package} declares no [head] source")]
    NoHeadSource {
        /// Package whose formula lacks the table.
        package: String,
    },

    /// I/O error while writing or reading source files.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}
