//! CLI argument definitions for the NetRain formula.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Install and verify the NetRain network monitor from its formula.
#[derive(Parser, Debug)]
#[command(name = "netrain-formula")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install and verify the NetRain network monitor from its formula.\n\n",
    "The formula pins the release archive, its build and runtime ",
    "dependencies, and the post-install caveats. `install` builds NetRain ",
    "from source with cargo into a versioned prefix; `test` runs the ",
    "installed binary's version and lifecycle checks.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build from a local checkout:\n",
    "    $ netrain-formula install --source-dir ~/src/netrain\n\n",
    "  Build the development branch:\n",
    "    $ netrain-formula install --head\n\n",
    "  Verify the install with a shorter grace period:\n",
    "    $ netrain-formula test --grace-period-ms 500\n\n",
    "  Show what needs root:\n",
    "    $ netrain-formula caveats",
))]
pub struct Cli {
    /// Formula file to use instead of the bundled one.
    #[arg(long, global = true, value_name = "PATH")]
    pub formula: Option<Utf8PathBuf>,

    /// Increase output verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch, build, and install the package.
    Install(InstallArgs),

    /// Verify an installed package.
    Test(TestArgs),

    /// Print the post-install caveats.
    Caveats,

    /// List build and runtime dependencies.
    Deps(DepsArgs),

    /// Show formula details and install status.
    Info(PrefixArgs),
}

/// Install prefix selection shared by several subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct PrefixArgs {
    /// Install prefix [default: platform data dir/Cellar/<name>/<version>].
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    #[command(flatten)]
    #[allow(missing_docs, reason = "flattened argument group")]
    pub prefix: PrefixArgs,

    /// Build from an existing source checkout.
    #[arg(long, value_name = "DIR", group = "source")]
    pub source_dir: Option<Utf8PathBuf>,

    /// Build from a local copy of the release archive.
    #[arg(long, value_name = "FILE", group = "source")]
    pub archive: Option<Utf8PathBuf>,

    /// Build the development branch declared in the formula.
    #[arg(long, group = "source")]
    pub head: bool,

    /// Number of parallel cargo build jobs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Skip probing build dependencies.
    #[arg(long)]
    pub skip_deps: bool,
}

/// Arguments for the test command.
#[derive(Args, Debug, Clone, Default)]
pub struct TestArgs {
    #[command(flatten)]
    #[allow(missing_docs, reason = "flattened argument group")]
    pub prefix: PrefixArgs,

    /// Milliseconds the demo process runs before SIGTERM.
    #[arg(long, value_name = "MS")]
    pub grace_period_ms: Option<u64>,

    /// Milliseconds to wait for the demo process to exit after SIGTERM.
    #[arg(long, value_name = "MS")]
    pub reap_timeout_ms: Option<u64>,

    /// Require `--version` to exit with status zero.
    #[arg(long)]
    pub strict_exit: bool,
}

/// Arguments for the deps command.
#[derive(Args, Debug, Clone, Default)]
pub struct DepsArgs {
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
