//! Release archive download.
//!
//! Provides a trait-based abstraction for fetching the source archive so
//! tests can substitute a mock without network access.

use super::error::FetchError;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for source archive downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Trait for downloading a source archive to disk.
///
/// # Examples
///
/// ```no_run
/// use netrain_formula_installer::source::download::{HttpDownloader, SourceDownloader};
/// use std::path::Path;
///
/// let downloader = HttpDownloader;
/// downloader.download(
///     "https://github.com/marcuspat/netrain/archive/v0.2.0.tar.gz",
///     Path::new("/tmp/netrain-0.2.0.tar.gz"),
/// )?;
/// # Ok::<(), netrain_formula_installer::source::FetchError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait SourceDownloader {
    /// Download `url` into `dest`.
    ///
    /// `dest` only exists once the whole body has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl SourceDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;

        let partial = dest.with_extension("part");
        let mut file = std::fs::File::create(&partial)?;
        let copied = std::io::copy(&mut response.into_body().as_reader(), &mut file);
        drop(file);
        if let Err(err) = copied {
            let _ = std::fs::remove_file(&partial);
            return Err(FetchError::Download {
                url: url.to_owned(),
                reason: err.to_string(),
            });
        }
        std::fs::rename(&partial, dest)?;
        Ok(())
    }
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Download {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
