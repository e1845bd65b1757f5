//! SHA-256 verification of source archives.
//!
//! Archives are always hashed and compared before any entry is unpacked.

use super::error::FetchError;
use netrain_formula::checksum::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns [`FetchError::Io`] if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String, FetchError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that the archive at `path` hashes to `expected`.
///
/// # Errors
///
/// Returns [`FetchError::ChecksumMismatch`] when the digests differ, or
/// [`FetchError::Io`] if the file cannot be read.
pub fn verify_archive(path: &Path, expected: &Sha256Digest) -> Result<(), FetchError> {
    let actual = sha256_file(path)?;
    if expected.matches_hex(&actual) {
        Ok(())
    } else {
        Err(FetchError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of the ASCII bytes "abc".
    const ABC_DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn write_abc() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("abc.bin");
        fs::write(&path, b"abc").expect("write file");
        (dir, path)
    }

    #[test]
    fn hashes_known_vector() {
        let (_dir, path) = write_abc();
        assert_eq!(sha256_file(&path).expect("hash"), ABC_DIGEST);
    }

    #[test]
    fn matching_digest_verifies() {
        let (_dir, path) = write_abc();
        let expected = Sha256Digest::try_from(ABC_DIGEST).expect("valid digest");
        verify_archive(&path, &expected).expect("digest matches");
    }

    #[test]
    fn mismatched_digest_reports_both_values() {
        let (_dir, path) = write_abc();
        let expected = Sha256Digest::try_from("0".repeat(64).as_str()).expect("valid digest");

        let err = verify_archive(&path, &expected).expect_err("digest differs");
        match err {
            FetchError::ChecksumMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "0".repeat(64));
                assert_eq!(actual, ABC_DIGEST);
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
