//! Cargo build orchestration for the packaged binary.
//!
//! The build runs `cargo install --locked --root <staging> --path <source>`
//! against a staging root inside the install prefix. A non-zero exit is
//! fatal and carries the build tool's stderr; only a successful build is
//! promoted into `<prefix>/bin`.

use crate::deps::CommandExecutor;
use crate::error::{InstallerError, Result};
use crate::stager::{InstallPrefix, InstalledArtifact};
use camino::Utf8Path;
use log::{debug, info};
use netrain_formula::PackageDescriptor;

/// Build tool invoked for every install.
pub const BUILD_TOOL: &str = "cargo";

/// Configuration for the build process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Number of parallel build jobs (None for cargo default).
    pub jobs: Option<usize>,
    /// How many `-v` flags to pass through to cargo.
    pub verbosity: u8,
}

/// Builds a package from source into an install prefix.
pub struct Builder<'a> {
    config: BuildConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Builder<'a> {
    /// Create a builder that runs cargo through `executor`.
    #[must_use]
    pub fn new(config: BuildConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Arguments passed to `cargo` for one build.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use netrain_formula_installer::builder::{BuildConfig, Builder};
    /// use netrain_formula_installer::deps::SystemCommandExecutor;
    ///
    /// let executor = SystemCommandExecutor;
    /// let builder = Builder::new(BuildConfig::default(), &executor);
    /// let args = builder.install_args(Utf8Path::new("/keg/.staging"), Utf8Path::new("/src"));
    /// assert_eq!(
    ///     args,
    ///     ["install", "--locked", "--root", "/keg/.staging", "--path", "/src"]
    /// );
    /// ```
    #[must_use]
    pub fn install_args(&self, staging_root: &Utf8Path, source_dir: &Utf8Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "install",
            "--locked",
            "--root",
            staging_root.as_str(),
            "--path",
            source_dir.as_str(),
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();

        if let Some(jobs) = self.config.jobs {
            args.push("--jobs".to_owned());
            args.push(jobs.to_string());
        }
        args.extend((0..self.config.verbosity).map(|_| "-v".to_owned()));
        args
    }

    /// Build `descriptor` from `source_dir` and install it under `prefix`.
    ///
    /// An existing install at `prefix` survives a failed build untouched.
    /// A successful build unregisters the prefix before replacing the
    /// binary; the caller re-registers it by writing a new receipt.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::BuildFailed`] if cargo exits unsuccessfully
    /// or produces no binary, [`InstallerError::PrefixUnavailable`] if the
    /// prefix cannot be used, or an I/O error from promotion.
    pub fn build(
        &self,
        descriptor: &PackageDescriptor,
        source_dir: &Utf8Path,
        prefix: &InstallPrefix,
    ) -> Result<InstalledArtifact> {
        prefix.prepare()?;
        let staging = prefix.staging_area()?;
        let args = self.install_args(staging.root(), source_dir);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        info!(
            "building {} {} from {source_dir}",
            descriptor.name(),
            descriptor.version()
        );
        let output = self.executor.run(BUILD_TOOL, &arg_refs)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = if stderr.trim().is_empty() {
                format!("{BUILD_TOOL} exited with {}", output.status)
            } else {
                stderr.trim_end().to_owned()
            };
            return Err(InstallerError::BuildFailed {
                package: descriptor.name().to_owned(),
                reason,
            });
        }

        prefix.unregister()?;
        let artifact = prefix.promote(&staging, descriptor.name())?;
        staging.discard()?;
        debug!("installed {}", artifact.path());
        Ok(artifact)
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
