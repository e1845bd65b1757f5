//! Source archive checksums.
//!
//! A formula either pins its release archive to a SHA-256 digest or carries
//! the `PLACEHOLDER_SHA256` marker used while a release is being cut. Only a
//! pinned digest authorises installing from a downloaded archive.

use crate::error::{FormulaError, Result};
use std::fmt;

/// Marker used in formula files whose archive digest is not yet known.
pub const PLACEHOLDER_SHA256: &str = "PLACEHOLDER_SHA256";

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated hex-encoded SHA-256 digest string.
///
/// # Examples
///
/// ```
/// use netrain_formula::checksum::Sha256Digest;
///
/// let hex = "0f".repeat(32);
/// let digest = Sha256Digest::try_from(hex.as_str()).unwrap();
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against another hex digest, ignoring ASCII case.
    #[must_use]
    pub fn matches_hex(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = FormulaError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checksum recorded for the formula's release archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChecksum {
    /// The archive is pinned to this digest.
    Sha256(Sha256Digest),
    /// The formula still carries [`PLACEHOLDER_SHA256`].
    Unpinned,
}

impl SourceChecksum {
    /// Parse the `sha256` field of a formula.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::InvalidSha256Digest`] when the value is neither
    /// the placeholder marker nor a well-formed digest.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed == PLACEHOLDER_SHA256 {
            return Ok(Self::Unpinned);
        }
        Sha256Digest::try_from(trimmed).map(Self::Sha256)
    }

    /// Return the pinned digest, if any.
    #[must_use]
    pub fn digest(&self) -> Option<&Sha256Digest> {
        match self {
            Self::Sha256(digest) => Some(digest),
            Self::Unpinned => None,
        }
    }
}

impl fmt::Display for SourceChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256(digest) => write!(f, "{digest}"),
            Self::Unpinned => f.write_str(PLACEHOLDER_SHA256),
        }
    }
}

fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(FormulaError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(FormulaError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(FormulaError::InvalidSha256Digest {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}
