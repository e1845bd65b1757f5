//! Git operations for building from the development branch.
//!
//! `--head` installs clone the formula's `[head]` repository. Clones are
//! shallow and single-branch, and carry a timeout so a stalled network
//! cannot hang the install.

use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use log::debug;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for git operations (5 minutes).
const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shallow-clones `branch` of `url` into `target`.
///
/// Creates the parent directories if they do not exist.
///
/// # Errors
///
/// Returns `InstallerError::Git` if the clone fails or times out.
pub fn clone_branch(url: &str, branch: &str, target: &Utf8Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args = clone_args(url, branch, target);
    let output = run_git_with_timeout(&args, "clone", GIT_TIMEOUT)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InstallerError::Git {
            operation: "clone",
            message: stderr.trim().to_owned(),
        });
    }

    Ok(())
}

fn clone_args<'a>(url: &'a str, branch: &'a str, target: &'a Utf8Path) -> [&'a str; 8] {
    [
        "clone",
        "--quiet",
        "--depth",
        "1",
        "--branch",
        branch,
        url,
        target.as_str(),
    ]
}

/// Runs a git command with a timeout.
///
/// Returns the command output if it completes within the timeout, or an error
/// if the command times out or fails to start.
fn run_git_with_timeout(
    args: &[&str],
    operation: &'static str,
    timeout: Duration,
) -> Result<Output> {
    debug!("git {}", args.join(" "));
    let mut child = Command::new("git")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| InstallerError::Git {
            operation,
            message: format!("could not start git: {e}"),
        })?;

    match child.wait_timeout(timeout)? {
        Some(status) => {
            let stdout = child
                .stdout
                .take()
                .map(std::io::read_to_string)
                .transpose()?
                .unwrap_or_default();
            let stderr = child
                .stderr
                .take()
                .map(std::io::read_to_string)
                .transpose()?
                .unwrap_or_default();

            Ok(Output {
                status,
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            })
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(InstallerError::Git {
                operation,
                message: format!("operation timed out after {} seconds", timeout.as_secs()),
            })
        }
    }
}
