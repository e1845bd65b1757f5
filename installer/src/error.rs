//! Error types for the NetRain formula installer.
//!
//! Install-time failures (`BuildFailed`, fetch and checksum problems) abort
//! the install. Verification failures (`VersionCheck`, `ProcessLifecycle`)
//! are reported against the check that raised them. Each message carries
//! the diagnostic the user needs: the build tool's stderr, the captured
//! version output, or the process state at the point of failure.

use crate::process::ProcessError;
use crate::source::FetchError;
use camino::Utf8PathBuf;
use netrain_formula::FormulaError;
use thiserror::Error;

/// Errors that can occur while installing or verifying a package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The formula file could not be loaded.
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// The build command exited unsuccessfully or produced no binary.
    #[error("build failed for {package}: {reason}")]
    BuildFailed {
        /// Package being built.
        package: String,
        /// Build tool diagnostic, usually its stderr.
        reason: String,
    },

    /// A build dependency's probe command failed.
    #[error("missing build dependencies: {}; install them and retry", names.join(", "))]
    MissingBuildDependency {
        /// Names of the unavailable dependencies.
        names: Vec<String>,
    },

    /// The formula has no pinned checksum, so its archive cannot be trusted.
    #[error(
        "{package} has no pinned sha256 checksum; use --source-dir, --head, or pin the formula"
    )]
    ChecksumUnpinned {
        /// Package whose formula carries the placeholder.
        package: String,
    },

    /// Fetching, verifying, or unpacking the source failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cloning the development branch failed or timed out.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The install receipt could not be read or written.
    #[error("install receipt at {path} is unusable: {reason}")]
    Receipt {
        /// Path of the receipt file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// No completed install was found at the prefix.
    #[error("{package} is not installed at {prefix}; run the install command first")]
    NotInstalled {
        /// Package that was looked up.
        package: String,
        /// Prefix that was inspected.
        prefix: Utf8PathBuf,
    },

    /// `--version` output did not contain the expected banner.
    #[error("version check failed: expected \"{expected}\" in output {output:?}")]
    VersionCheck {
        /// Banner that was expected.
        expected: String,
        /// Captured combined output.
        output: String,
    },

    /// `--version` printed the banner but exited unsuccessfully while a
    /// zero exit status was required.
    #[error("version check failed: `--version` exited with {status}; output {output:?}")]
    VersionExitStatus {
        /// Exit status that was collected.
        status: std::process::ExitStatus,
        /// Captured combined output.
        output: String,
    },

    /// Spawning, signalling, or reaping the process under test failed.
    #[error("process lifecycle check failed: {0}")]
    ProcessLifecycle(#[from] ProcessError),

    /// One or more verification checks failed.
    #[error("verification failed: {}", failed.join(", "))]
    VerificationFailed {
        /// Names of the failing checks.
        failed: Vec<String>,
    },

    /// The install prefix could not be determined or is unusable.
    #[error("install prefix unavailable: {reason}")]
    PrefixUnavailable {
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
