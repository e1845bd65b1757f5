//! Test support utilities for installer behavioural tests.
//!
//! Provides scratch directories, fake binaries, and an offline downloader
//! shared by the behaviour suites.

#![allow(dead_code, reason = "each suite uses a subset of the helpers")]

use camino::{Utf8Path, Utf8PathBuf};
use netrain_formula_installer::source::FetchError;
use netrain_formula_installer::source::download::SourceDownloader;
use std::path::Path;
use tempfile::TempDir;

/// Fake binary that records its pid and ignores `SIGTERM` in demo mode.
pub fn sigterm_ignoring_script(pid_file: &Utf8Path) -> String {
    format!("#!/bin/sh\necho $$ > {pid_file}\ntrap '' TERM\nexec sleep 30\n")
}

/// Fake binary that prints an outdated banner.
pub const STALE_VERSION_SCRIPT: &str = "#!/bin/sh\necho 'NetRain v0.1.9'\n";

/// Fake binary that exits as soon as it starts.
pub const EARLY_EXIT_SCRIPT: &str = "#!/bin/sh\nexit 0\n";

/// A temporary directory addressed by a UTF-8 path.
pub struct Scratch {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Scratch {
    /// Create a fresh scratch directory.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("temp dir not UTF-8");
        Self { _temp: temp, root }
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// Downloader for suites that must not touch the network.
pub struct OfflineDownloader;

impl SourceDownloader for OfflineDownloader {
    fn download(&self, url: &str, _dest: &Path) -> Result<(), FetchError> {
        Err(FetchError::Download {
            url: url.to_owned(),
            reason: "network disabled in behaviour tests".to_owned(),
        })
    }
}

/// Returns true while a process with `pid` exists.
#[cfg(unix)]
pub fn is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid, 0) == 0 }
}
