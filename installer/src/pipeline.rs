//! Install and verification pipeline orchestration.
//!
//! Composes the individual steps into the two operations the CLI exposes:
//! [`install`] (preflight, fetch, build, register) and [`verify`] (locate
//! the registered binary and run the harness against it).

use crate::builder::{BuildConfig, Builder};
use crate::deps::{CommandExecutor, ensure_build_tools};
use crate::error::{InstallerError, Result};
use crate::harness::{HarnessConfig, VerificationHarness, VerificationReport};
use crate::receipt::InstallReceipt;
use crate::source::download::SourceDownloader;
use crate::source::{SourceFetcher, SourceRequest};
use crate::stager::{InstallPrefix, InstalledArtifact};
use camino::Utf8PathBuf;
use log::info;
use netrain_formula::PackageDescriptor;

/// What to install and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Where the sources come from.
    pub source: SourceRequest,
    /// Options passed through to the build.
    pub build: BuildConfig,
    /// Skip probing build dependencies.
    pub skip_deps: bool,
}

/// Collaborators used by [`install`].
pub struct InstallContext<'a> {
    /// Runs dependency probes and the build tool.
    pub executor: &'a dyn CommandExecutor,
    /// Downloads release archives.
    pub downloader: &'a dyn SourceDownloader,
    /// Directory release archives are cached in.
    pub cache_dir: Utf8PathBuf,
}

/// Install `descriptor` into `prefix`.
///
/// The receipt is written last. A failure at any earlier step leaves an
/// existing install, including its receipt, as it was.
///
/// # Errors
///
/// Returns the first failure from dependency preflight, source
/// acquisition, the build, or writing the receipt.
pub fn install(
    descriptor: &PackageDescriptor,
    prefix: &InstallPrefix,
    request: &InstallRequest,
    context: &InstallContext<'_>,
) -> Result<InstallReceipt> {
    if !request.skip_deps {
        ensure_build_tools(context.executor, descriptor.dependencies())?;
    }

    let fetcher = SourceFetcher::new(context.downloader, context.cache_dir.clone());
    let tree = fetcher.fetch(descriptor, &request.source)?;

    let builder = Builder::new(request.build, context.executor);
    let artifact = builder.build(descriptor, tree.dir(), prefix)?;

    let receipt = InstallReceipt::new(descriptor, tree.origin().clone(), artifact.path());
    receipt.write(&prefix.receipt_path())?;
    info!("registered {} at {}", descriptor.name(), prefix.root());
    Ok(receipt)
}

/// Locate the binary registered for `descriptor` under `prefix`.
///
/// # Errors
///
/// Returns [`InstallerError::NotInstalled`] when there is no receipt, the
/// receipt names another package, or the binary it records is missing.
pub fn installed_artifact(
    descriptor: &PackageDescriptor,
    prefix: &InstallPrefix,
) -> Result<InstalledArtifact> {
    let not_installed = || InstallerError::NotInstalled {
        package: descriptor.name().to_owned(),
        prefix: prefix.root().to_owned(),
    };

    let receipt = InstallReceipt::read(&prefix.receipt_path())?.ok_or_else(not_installed)?;
    if receipt.name != descriptor.name() || !receipt.artifact.is_file() {
        return Err(not_installed());
    }
    Ok(InstalledArtifact::new(receipt.artifact))
}

/// Run the verification harness against the install at `prefix`.
///
/// # Errors
///
/// Returns [`InstallerError::NotInstalled`] if nothing is registered there.
/// Check failures are reported in the returned report, not as errors.
pub fn verify(
    descriptor: &PackageDescriptor,
    prefix: &InstallPrefix,
    config: HarnessConfig,
) -> Result<VerificationReport> {
    let artifact = installed_artifact(descriptor, prefix)?;
    let harness = VerificationHarness::new(descriptor, config);
    Ok(harness.run(&artifact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::SourceOrigin;
    use crate::source::download::MockSourceDownloader;
    use crate::test_utils::{FakeBuild, FakeCargo, NETRAIN_SCRIPT};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Workspace {
        _temp: TempDir,
        prefix: InstallPrefix,
        source: Utf8PathBuf,
        cache: Utf8PathBuf,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8 temp path");
        let source = root.join("netrain");
        std::fs::create_dir_all(&source).expect("source dir");
        std::fs::write(source.join("Cargo.toml"), "[package]\nname = \"netrain\"\n")
            .expect("manifest");
        Workspace {
            prefix: InstallPrefix::new(root.join("keg")),
            cache: root.join("cache"),
            source,
            _temp: temp,
        }
    }

    #[fixture]
    fn descriptor() -> PackageDescriptor {
        PackageDescriptor::builtin().expect("bundled formula parses")
    }

    fn local_request(workspace: &Workspace) -> InstallRequest {
        InstallRequest {
            source: SourceRequest::Directory(workspace.source.clone()),
            build: BuildConfig::default(),
            skip_deps: false,
        }
    }

    #[rstest]
    fn install_registers_binary(workspace: Workspace, descriptor: PackageDescriptor) {
        let executor = FakeCargo::new("netrain", FakeBuild::Succeed(NETRAIN_SCRIPT.to_owned()));
        let downloader = MockSourceDownloader::new();
        let context = InstallContext {
            executor: &executor,
            downloader: &downloader,
            cache_dir: workspace.cache.clone(),
        };

        let receipt = install(
            &descriptor,
            &workspace.prefix,
            &local_request(&workspace),
            &context,
        )
        .expect("install succeeds");

        assert_eq!(receipt.artifact, workspace.prefix.artifact_path("netrain"));
        assert_eq!(
            receipt.source,
            SourceOrigin::Local {
                path: workspace.source.clone()
            }
        );
        let artifact =
            installed_artifact(&descriptor, &workspace.prefix).expect("install is registered");
        assert_eq!(artifact.path(), receipt.artifact);
        assert_eq!(executor.calls()[0], ["--version"]);
    }

    #[rstest]
    fn skip_deps_does_not_probe(workspace: Workspace, descriptor: PackageDescriptor) {
        let executor = FakeCargo::new("netrain", FakeBuild::Succeed(NETRAIN_SCRIPT.to_owned()));
        let downloader = MockSourceDownloader::new();
        let context = InstallContext {
            executor: &executor,
            downloader: &downloader,
            cache_dir: workspace.cache.clone(),
        };
        let request = InstallRequest {
            skip_deps: true,
            ..local_request(&workspace)
        };

        install(&descriptor, &workspace.prefix, &request, &context).expect("install succeeds");
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(executor.build_count(), 1);
    }

    #[rstest]
    fn failed_build_writes_no_receipt(workspace: Workspace, descriptor: PackageDescriptor) {
        let executor = FakeCargo::new("netrain", FakeBuild::Fail("error: aborting".to_owned()));
        let downloader = MockSourceDownloader::new();
        let context = InstallContext {
            executor: &executor,
            downloader: &downloader,
            cache_dir: workspace.cache.clone(),
        };

        let err = install(
            &descriptor,
            &workspace.prefix,
            &local_request(&workspace),
            &context,
        )
        .expect_err("build fails");

        assert!(matches!(err, InstallerError::BuildFailed { .. }));
        assert!(!workspace.prefix.receipt_path().exists());
        assert!(matches!(
            installed_artifact(&descriptor, &workspace.prefix),
            Err(InstallerError::NotInstalled { .. })
        ));
    }

    #[rstest]
    fn verify_requires_an_install(workspace: Workspace, descriptor: PackageDescriptor) {
        let err = verify(&descriptor, &workspace.prefix, HarnessConfig::default())
            .expect_err("nothing installed");
        assert!(matches!(err, InstallerError::NotInstalled { .. }));
    }
}
