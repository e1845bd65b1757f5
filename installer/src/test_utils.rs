//! Shared test utilities for the installer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour tests under `tests/`.

use crate::deps::CommandExecutor;
use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use netrain_formula::PackageDescriptor;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Script used for fake NetRain binaries: prints the release banner on
/// `--version` (exiting non-zero like the real tool) and idles on `--demo`
/// until signalled.
pub const NETRAIN_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "NetRain v0.2.0"; exit 1 ;;
  --demo) exec sleep 30 ;;
esac
exit 2
"#;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "cargo").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected
            .pop_front()
            .ok_or_else(|| InstallerError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {args:?}"),
            })?;

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args.as_slice(), args);

        call.result
    }
}

/// How a [`FakeCargo`] responds to `cargo install`.
#[derive(Debug, Clone)]
pub enum FakeBuild {
    /// Write `bin/<name>` under `--root` with the given script and succeed.
    Succeed(String),
    /// Exit non-zero with the given stderr, writing nothing.
    Fail(String),
    /// Exit zero without producing a binary.
    SucceedEmpty,
}

/// A `CommandExecutor` that imitates `cargo install --root`.
///
/// Probe commands (`cargo --version`) succeed. `cargo install` behaves as
/// configured by [`FakeBuild`]. Every invocation is recorded.
#[derive(Debug)]
pub struct FakeCargo {
    binary: String,
    outcome: RefCell<FakeBuild>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeCargo {
    /// Fake a build that installs `binary` with `outcome`.
    pub fn new(binary: &str, outcome: FakeBuild) -> Self {
        Self {
            binary: binary.to_owned(),
            outcome: RefCell::new(outcome),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Change the outcome of later builds.
    pub fn set_outcome(&self, outcome: FakeBuild) {
        *self.outcome.borrow_mut() = outcome;
    }

    /// Argument lists of every recorded invocation.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Number of `cargo install` invocations.
    pub fn build_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|args| args.first().is_some_and(|a| a == "install"))
            .count()
    }

    fn install(&self, args: &[&str]) -> Result<Output> {
        let root = args
            .windows(2)
            .find(|pair| pair[0] == "--root")
            .map(|pair| Utf8PathBuf::from(pair[1]))
            .ok_or_else(|| InstallerError::StubMismatch {
                message: format!("cargo install without --root: {args:?}"),
            })?;

        match self.outcome.borrow().clone() {
            FakeBuild::Succeed(script) => {
                write_executable(&root.join("bin"), &self.binary, &script)?;
                Ok(success_output())
            }
            FakeBuild::Fail(stderr) => Ok(failure_output(&stderr)),
            FakeBuild::SucceedEmpty => Ok(success_output()),
        }
    }
}

impl CommandExecutor for FakeCargo {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        self.calls
            .borrow_mut()
            .push(args.iter().map(|a| (*a).to_owned()).collect());

        match (cmd, args.first().copied()) {
            ("cargo", Some("--version")) => Ok(success_output()),
            ("cargo", Some("install")) => self.install(args),
            _ => Err(InstallerError::StubMismatch {
                message: format!("unexpected command invocation: {cmd} {args:?}"),
            }),
        }
    }
}

/// Write an executable script named `name` into `dir`.
///
/// # Errors
///
/// Returns any I/O error raised while writing the file.
pub fn write_executable(dir: &Utf8Path, name: &str, script: &str) -> Result<Utf8PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(path)
}

/// Write a gzip-compressed release tarball whose single top-level
/// directory is `root_dir`, containing a `Cargo.toml`.
///
/// # Errors
///
/// Returns any I/O error raised while writing the archive.
pub fn write_source_tarball(path: &Path, root_dir: &str) -> Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let manifest = "[package]\nname = \"netrain\"\nversion = \"0.2.0\"\n";
    let file = std::fs::File::create(path)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(
        &mut header,
        format!("{root_dir}/Cargo.toml"),
        manifest.as_bytes(),
    )?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// A NetRain formula pinned to `sha256`, downloading from `url`.
///
/// # Panics
///
/// Panics if `sha256` is not a valid digest.
pub fn pinned_formula(url: &str, sha256: &str) -> PackageDescriptor {
    let text = format!(
        r#"
[package]
name = "netrain"
display_name = "NetRain"
url = "{url}"
sha256 = "{sha256}"
license = "MIT"
version = "0.2.0"

[head]
url = "https://github.com/marcuspat/netrain.git"

[[dependencies]]
name = "rust"
role = "build"
probe = ["cargo", "--version"]
"#
    );
    PackageDescriptor::from_toml(&text).expect("pinned test formula should parse")
}
