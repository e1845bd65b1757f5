//! Behaviour-driven tests for the verification harness.
//!
//! These scenarios run fake NetRain binaries through the version and
//! lifecycle checks, including the default two-second grace period.

#![cfg(unix)]

mod support;

use camino::Utf8PathBuf;
use netrain_formula::PackageDescriptor;
use netrain_formula_installer::error::InstallerError;
use netrain_formula_installer::harness::{HarnessConfig, VerificationHarness};
use netrain_formula_installer::process::ProcessError;
use netrain_formula_installer::stager::InstalledArtifact;
use netrain_formula_installer::test_utils::{NETRAIN_SCRIPT, write_executable};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::{Cell, RefCell};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use support::Scratch;

// ---------------------------------------------------------------------------
// Harness world
// ---------------------------------------------------------------------------

struct HarnessWorld {
    scratch: Scratch,
    descriptor: PackageDescriptor,
    artifact: RefCell<Option<InstalledArtifact>>,
    config: Cell<HarnessConfig>,
    pid_file: RefCell<Option<Utf8PathBuf>>,
    version: RefCell<Option<Result<String, InstallerError>>>,
    lifecycle: RefCell<Option<Result<ExitStatus, InstallerError>>>,
    elapsed: Cell<Duration>,
}

impl HarnessWorld {
    fn install(&self, script: &str) {
        let path =
            write_executable(self.scratch.root(), "netrain", script).expect("fake binary written");
        self.artifact.replace(Some(InstalledArtifact::new(path)));
    }

    fn harness(&self) -> VerificationHarness {
        VerificationHarness::new(&self.descriptor, self.config.get())
    }
}

#[fixture]
fn harness_world() -> HarnessWorld {
    let descriptor = PackageDescriptor::builtin().expect("bundled formula parses");
    HarnessWorld {
        scratch: Scratch::new(),
        config: Cell::new(HarnessConfig::from(descriptor.harness())),
        descriptor,
        artifact: RefCell::new(None),
        pid_file: RefCell::new(None),
        version: RefCell::new(None),
        lifecycle: RefCell::new(None),
        elapsed: Cell::new(Duration::ZERO),
    }
}

#[given("an installed NetRain binary")]
fn given_netrain_binary(harness_world: &HarnessWorld) {
    harness_world.install(NETRAIN_SCRIPT);
}

#[given("an installed binary reporting version 0.1.9")]
fn given_stale_binary(harness_world: &HarnessWorld) {
    harness_world.install(support::STALE_VERSION_SCRIPT);
}

#[given("an installed binary that ignores SIGTERM")]
fn given_stubborn_binary(harness_world: &HarnessWorld) {
    let pid_file = harness_world.scratch.root().join("demo.pid");
    harness_world.install(&support::sigterm_ignoring_script(&pid_file));
    harness_world.pid_file.replace(Some(pid_file));
}

#[given("an installed binary that exits immediately")]
fn given_early_exit_binary(harness_world: &HarnessWorld) {
    harness_world.install(support::EARLY_EXIT_SCRIPT);
}

#[given("fast harness timings")]
fn given_fast_timings(harness_world: &HarnessWorld) {
    harness_world.config.set(HarnessConfig {
        grace_period: Duration::from_millis(200),
        reap_timeout: Duration::from_millis(300),
        version_timeout: Duration::from_secs(2),
        overall_timeout: Duration::from_secs(10),
        allow_nonzero_exit: true,
    });
}

#[given("the default harness timings")]
fn given_default_timings(harness_world: &HarnessWorld) {
    let config = HarnessConfig::from(harness_world.descriptor.harness());
    assert_eq!(config.grace_period, Duration::from_secs(2));
    assert_eq!(config.reap_timeout, Duration::from_secs(1));
    harness_world.config.set(config);
}

#[when("the version check runs")]
fn when_version_check(harness_world: &HarnessWorld) {
    let artifact = harness_world.artifact.borrow();
    let artifact = artifact.as_ref().expect("binary not installed");
    let result = harness_world.harness().check_version(artifact);
    harness_world.version.replace(Some(result));
}

#[when("the lifecycle check runs")]
fn when_lifecycle_check(harness_world: &HarnessWorld) {
    let artifact = harness_world.artifact.borrow();
    let artifact = artifact.as_ref().expect("binary not installed");
    let started = Instant::now();
    let result = harness_world.harness().check_lifecycle(artifact);
    harness_world.elapsed.set(started.elapsed());
    harness_world.lifecycle.replace(Some(result));
}

#[then("the version check passes")]
fn then_version_passes(harness_world: &HarnessWorld) {
    let result = harness_world.version.borrow();
    match result.as_ref().expect("version check not run") {
        Ok(output) => assert!(output.contains("NetRain v0.2.0")),
        Err(err) => panic!("expected the version check to pass: {err}"),
    }
}

#[then("the version check fails with the captured output")]
fn then_version_fails(harness_world: &HarnessWorld) {
    let result = harness_world.version.borrow();
    match result.as_ref().expect("version check not run") {
        Err(InstallerError::VersionCheck { expected, output }) => {
            assert_eq!(expected, "NetRain v0.2.0");
            assert!(output.contains("NetRain v0.1.9"));
        }
        other => panic!("expected VersionCheck, got {other:?}"),
    }
}

#[then("the lifecycle check passes")]
fn then_lifecycle_passes(harness_world: &HarnessWorld) {
    let result = harness_world.lifecycle.borrow();
    if let Err(err) = result.as_ref().expect("lifecycle check not run") {
        panic!("expected the lifecycle check to pass: {err}");
    }
}

#[then("the check lasted at least the grace period")]
fn then_grace_period_elapsed(harness_world: &HarnessWorld) {
    let config = harness_world.config.get();
    let elapsed = harness_world.elapsed.get();
    assert!(elapsed >= config.grace_period, "finished after {elapsed:?}");
    assert!(
        elapsed < config.grace_period + config.reap_timeout + Duration::from_secs(1),
        "took {elapsed:?}"
    );
}

#[then("the lifecycle check fails with a reap timeout")]
fn then_reap_timeout(harness_world: &HarnessWorld) {
    let result = harness_world.lifecycle.borrow();
    let result = result.as_ref().expect("lifecycle check not run");
    assert!(
        matches!(
            result,
            Err(InstallerError::ProcessLifecycle(ProcessError::ReapTimeout { .. }))
        ),
        "expected ReapTimeout, got {result:?}"
    );
}

#[then("no process is left running")]
fn then_no_orphan(harness_world: &HarnessWorld) {
    let pid_file = harness_world.pid_file.borrow();
    let pid_file = pid_file.as_ref().expect("pid file not configured");
    let pid: i32 = std::fs::read_to_string(pid_file)
        .expect("pid not recorded")
        .trim()
        .parse()
        .expect("pid not numeric");
    assert!(!support::is_alive(pid), "process {pid} outlived the check");
}

#[then("the lifecycle check fails because the process exited early")]
fn then_exited_early(harness_world: &HarnessWorld) {
    let result = harness_world.lifecycle.borrow();
    let result = result.as_ref().expect("lifecycle check not run");
    assert!(
        matches!(
            result,
            Err(InstallerError::ProcessLifecycle(ProcessError::ExitedEarly { .. }))
        ),
        "expected ExitedEarly, got {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/harness.feature", index = 0)]
fn scenario_version_nonzero_exit(harness_world: HarnessWorld) {
    let _ = harness_world;
}

#[scenario(path = "tests/features/harness.feature", index = 1)]
fn scenario_stale_version(harness_world: HarnessWorld) {
    let _ = harness_world;
}

#[scenario(path = "tests/features/harness.feature", index = 2)]
fn scenario_default_lifecycle(harness_world: HarnessWorld) {
    let _ = harness_world;
}

#[scenario(path = "tests/features/harness.feature", index = 3)]
fn scenario_ignored_sigterm(harness_world: HarnessWorld) {
    let _ = harness_world;
}

#[scenario(path = "tests/features/harness.feature", index = 4)]
fn scenario_early_exit(harness_world: HarnessWorld) {
    let _ = harness_world;
}
