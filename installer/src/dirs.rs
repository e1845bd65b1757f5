//! Directory resolution abstraction for platform-specific paths.
//!
//! Production code resolves directories through `directories-next`; tests
//! substitute a fixed layout through the mockall-generated `MockBaseDirs`.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Application directory name under the platform base directories.
const APP_DIR: &str = "netrain-formula";

/// Source of per-user base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Per-user local data directory (e.g. `~/.local/share`).
    fn data_local_dir(&self) -> Option<PathBuf>;

    /// Per-user cache directory (e.g. `~/.cache`).
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// Base directories of the current user, via `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn data_local_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.data_local_dir().to_path_buf())
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

/// Default keg prefix: `<data_local_dir>/netrain-formula/Cellar/<name>/<version>`.
#[must_use]
pub fn default_prefix(dirs: &dyn BaseDirs, name: &str, version: &str) -> Option<Utf8PathBuf> {
    dirs.data_local_dir()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .map(|p| p.join(APP_DIR).join("Cellar").join(name).join(version))
}

/// Download cache directory: `<cache_dir>/netrain-formula/downloads`.
#[must_use]
pub fn download_cache_dir(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    dirs.cache_dir()
        .and_then(|p| Utf8PathBuf::try_from(p).ok())
        .map(|p| p.join(APP_DIR).join("downloads"))
}
