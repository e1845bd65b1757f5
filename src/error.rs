//! Error types for formula loading and validation.

use thiserror::Error;

/// Errors raised while reading or validating a formula file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The formula file could not be read from disk.
    #[error("failed to read formula {path}: {reason}")]
    Read {
        /// Path of the formula file.
        path: String,
        /// Description of the I/O failure.
        reason: String,
    },

    /// The formula text is not valid TOML or does not match the schema.
    #[error("invalid formula: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
    },

    /// A required field is empty or malformed.
    #[error("invalid formula field `{field}`: {reason}")]
    InvalidField {
        /// Dotted name of the offending field.
        field: &'static str,
        /// Description of the constraint that was violated.
        reason: String,
    },

    /// A SHA-256 digest is not a 64-character lowercase hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`FormulaError`].
pub type Result<T> = std::result::Result<T, FormulaError>;
