//! Build dependency preflight.
//!
//! The formula's build dependencies may name a probe command. Before the
//! build runs, each probe is executed; a probe that cannot start or exits
//! unsuccessfully marks its dependency as missing. Runtime dependencies are
//! declared for the host resolver only and are never probed.

use crate::error::{InstallerError, Result};
use log::debug;
use netrain_formula::DependencySpec;
use std::process::{Command, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use netrain_formula_installer::deps::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("cargo", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), netrain_formula_installer::error::InstallerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(InstallerError::from)
    }
}

/// Returns the names of build dependencies whose probe failed.
///
/// Dependencies without a probe are assumed present.
pub fn missing_build_tools(executor: &dyn CommandExecutor, spec: &DependencySpec) -> Vec<String> {
    spec.build()
        .filter_map(|dependency| {
            let (program, args) = dependency.probe_command()?;
            let ok = command_succeeds(executor, program, &args);
            debug!("probe for {dependency}: {program} {args:?} -> {ok}");
            (!ok).then(|| dependency.name.clone())
        })
        .collect()
}

/// Fails with [`InstallerError::MissingBuildDependency`] when any probe fails.
///
/// # Errors
///
/// Returns the list of missing build dependencies.
pub fn ensure_build_tools(executor: &dyn CommandExecutor, spec: &DependencySpec) -> Result<()> {
    let names = missing_build_tools(executor, spec);
    if names.is_empty() {
        Ok(())
    } else {
        Err(InstallerError::MissingBuildDependency { names })
    }
}

/// Returns true if the given command executes successfully.
fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}
