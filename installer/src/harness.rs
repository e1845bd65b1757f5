//! Post-install verification of the installed binary.
//!
//! Two checks run, in order, against the installed artifact:
//!
//! 1. **Version**: `<binary> --version` must print the release banner
//!    (`NetRain v<version>`). Both output streams are searched. The exit
//!    status is ignored unless `allow_nonzero_exit` is off, because the
//!    real tool exits non-zero when it lacks capture privileges.
//! 2. **Lifecycle**: `<binary> --demo` is spawned, left to run for the
//!    grace period, confirmed alive, sent `SIGTERM`, and reaped within the
//!    reap timeout.
//!
//! Every wait is bounded. An overall deadline clips the grace period and
//! the reap wait, and every process spawned here is reaped before the
//! check returns, whether it passes or fails.

use crate::error::{InstallerError, Result};
use crate::process::{OutputMode, ProcessError, ProcessHandle, Signal};
use crate::stager::InstalledArtifact;
use log::{debug, info, warn};
use netrain_formula::{HarnessSettings, PackageDescriptor};
use std::fmt;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

/// Flag that prints the version banner.
pub const VERSION_FLAG: &str = "--version";

/// Bound on the forced reap performed after a failed check.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum time left for draining output after `--version` exits.
const OUTPUT_DRAIN_FLOOR: Duration = Duration::from_millis(100);

/// Timing and strictness knobs for the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// How long the demo process runs before it is signalled.
    pub grace_period: Duration,
    /// How long to wait for the demo process to exit after `SIGTERM`.
    pub reap_timeout: Duration,
    /// How long `--version` may run.
    pub version_timeout: Duration,
    /// Bound on the whole lifecycle check.
    pub overall_timeout: Duration,
    /// Accept a non-zero exit from `--version` when the banner is present.
    pub allow_nonzero_exit: bool,
}

impl From<&HarnessSettings> for HarnessConfig {
    fn from(settings: &HarnessSettings) -> Self {
        Self {
            grace_period: settings.grace_period(),
            reap_timeout: settings.reap_timeout(),
            version_timeout: settings.version_timeout(),
            overall_timeout: settings.overall_timeout(),
            allow_nonzero_exit: settings.allow_nonzero_exit,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::from(&HarnessSettings::default())
    }
}

/// The checks the harness performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// `--version` banner check.
    Version,
    /// `--demo` spawn, signal, and reap check.
    Lifecycle,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => f.write_str("version"),
            Self::Lifecycle => f.write_str("lifecycle"),
        }
    }
}

/// Result of one check.
#[derive(Debug)]
pub struct TestOutcome {
    /// Which check ran.
    pub check: CheckKind,
    /// `Ok` with a short summary, or the failure.
    pub result: Result<String>,
}

impl TestOutcome {
    /// Whether the check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a full harness run, in execution order.
#[derive(Debug, Default)]
pub struct VerificationReport {
    outcomes: Vec<TestOutcome>,
}

impl VerificationReport {
    /// Build a report from outcomes already collected.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<TestOutcome>) -> Self {
        Self { outcomes }
    }

    /// Every outcome, in execution order.
    #[must_use]
    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    /// True when every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(TestOutcome::passed)
    }

    /// Names of the checks that failed.
    #[must_use]
    pub fn failed_checks(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.passed())
            .map(|outcome| outcome.check.to_string())
            .collect()
    }

    /// Collapse the report into a single result.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::VerificationFailed`] naming every failed
    /// check.
    pub fn into_result(self) -> Result<()> {
        let failed = self.failed_checks();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(InstallerError::VerificationFailed { failed })
        }
    }
}

/// Wall-clock budget shared by the steps of one check.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    fn clip(&self, wanted: Duration) -> Duration {
        wanted.min(self.remaining())
    }

    fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Runs the post-install checks for one package.
#[derive(Debug, Clone)]
pub struct VerificationHarness {
    banner: String,
    demo_flag: String,
    config: HarnessConfig,
}

impl VerificationHarness {
    /// Create a harness for `descriptor` with explicit timing.
    #[must_use]
    pub fn new(descriptor: &PackageDescriptor, config: HarnessConfig) -> Self {
        Self {
            banner: descriptor.version_banner(),
            demo_flag: descriptor.demo_flag().to_owned(),
            config,
        }
    }

    /// Banner the version check looks for.
    #[must_use]
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Active timing and strictness.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run both checks and collect their outcomes.
    ///
    /// The lifecycle check runs even when the version check fails.
    #[must_use]
    pub fn run(&self, artifact: &InstalledArtifact) -> VerificationReport {
        let version = self.check_version(artifact);
        let lifecycle = self
            .check_lifecycle(artifact)
            .map(|status| format!("reaped with {status} after {}", Signal::Terminate));

        let outcomes = vec![
            TestOutcome {
                check: CheckKind::Version,
                result: version.map(|_| format!("found \"{}\"", self.banner)),
            },
            TestOutcome {
                check: CheckKind::Lifecycle,
                result: lifecycle,
            },
        ];
        for outcome in &outcomes {
            match &outcome.result {
                Ok(summary) => info!("{} check passed: {summary}", outcome.check),
                Err(err) => warn!("{} check failed: {err}", outcome.check),
            }
        }
        VerificationReport::from_outcomes(outcomes)
    }

    /// Run `<artifact> --version` and look for the banner.
    ///
    /// Returns the captured output (stdout followed by stderr).
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::VersionCheck`] if the banner is missing,
    /// [`InstallerError::VersionExitStatus`] if a zero exit is required and
    /// not given, and [`InstallerError::ProcessLifecycle`] if the binary
    /// cannot be spawned or does not exit within the version timeout.
    /// Output still held open by a descendant after the timeout is cut
    /// short rather than waited for.
    pub fn check_version(&self, artifact: &InstalledArtifact) -> Result<String> {
        let mut handle =
            ProcessHandle::spawn(artifact.path().as_str(), &[VERSION_FLAG], OutputMode::Capture)?;
        let deadline = Deadline::after(self.config.version_timeout);
        let waited = handle.wait(deadline.remaining());
        let status = release_on_error(&mut handle, waited)?;
        let output = handle.take_output(deadline.remaining().max(OUTPUT_DRAIN_FLOOR));
        debug!("{VERSION_FLAG} exited with {status}: {output:?}");

        if !output.contains(&self.banner) {
            return Err(InstallerError::VersionCheck {
                expected: self.banner.clone(),
                output,
            });
        }
        if !status.success() && !self.config.allow_nonzero_exit {
            return Err(InstallerError::VersionExitStatus { status, output });
        }
        Ok(output)
    }

    /// Spawn the demo mode, signal it after the grace period, and reap it.
    ///
    /// Returns the exit status collected after `SIGTERM`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ProcessLifecycle`] if the process cannot
    /// be spawned, exits before it is signalled, cannot be signalled, is
    /// not reaped within the reap timeout, or the overall deadline expires.
    pub fn check_lifecycle(&self, artifact: &InstalledArtifact) -> Result<ExitStatus> {
        let deadline = Deadline::after(self.config.overall_timeout);
        let mut handle = ProcessHandle::spawn(
            artifact.path().as_str(),
            &[self.demo_flag.as_str()],
            OutputMode::Discard,
        )?;

        std::thread::sleep(deadline.clip(self.config.grace_period));
        if deadline.expired() {
            let expired = Err(ProcessError::DeadlineExceeded {
                pid: handle.id(),
                timeout: self.config.overall_timeout,
                state: handle.state(),
            });
            return release_on_error(&mut handle, expired).map_err(Into::into);
        }

        let confirmed = handle.confirm_running();
        release_on_error(&mut handle, confirmed)?;
        let signalled = handle.signal(Signal::Terminate);
        release_on_error(&mut handle, signalled)?;

        let reap_budget = deadline.clip(self.config.reap_timeout);
        let waited = match handle.wait(reap_budget) {
            Err(ProcessError::ReapTimeout { pid, state, .. })
                if reap_budget < self.config.reap_timeout =>
            {
                Err(ProcessError::DeadlineExceeded {
                    pid,
                    timeout: self.config.overall_timeout,
                    state,
                })
            }
            other => other,
        };
        release_on_error(&mut handle, waited).map_err(Into::into)
    }
}

/// Pass `result` through, force-reaping `handle` first if it is an error.
fn release_on_error<T>(
    handle: &mut ProcessHandle,
    result: std::result::Result<T, ProcessError>,
) -> std::result::Result<T, ProcessError> {
    if result.is_ok() {
        return result;
    }
    if let Err(err) = handle.kill_and_reap(CLEANUP_TIMEOUT) {
        warn!("cleanup of process {} failed: {err}", handle.id());
    }
    result
}

#[cfg(all(test, unix))]
#[path = "harness_tests.rs"]
mod tests;
