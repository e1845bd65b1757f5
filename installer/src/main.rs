//! NetRain formula CLI entrypoint.
//!
//! Loads the formula (bundled, or `--formula PATH`) and dispatches to the
//! subcommands: `install` builds and registers the binary, `test` runs the
//! verification harness, and `caveats`, `deps`, and `info` print formula
//! details. Progress goes to stderr; command output goes to stdout.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::debug;
use netrain_formula::PackageDescriptor;
use netrain_formula_installer::builder::BuildConfig;
use netrain_formula_installer::cli::{
    Cli, Command, DepsArgs, InstallArgs, PrefixArgs, TestArgs,
};
use netrain_formula_installer::deps::{CommandExecutor, SystemCommandExecutor};
use netrain_formula_installer::dirs::{
    BaseDirs, SystemBaseDirs, default_prefix, download_cache_dir,
};
use netrain_formula_installer::error::{InstallerError, Result};
use netrain_formula_installer::harness::HarnessConfig;
use netrain_formula_installer::logging;
use netrain_formula_installer::output::{
    dependencies_json, format_dependencies, format_info, format_report, success_message,
};
use netrain_formula_installer::pipeline::{self, InstallContext, InstallRequest};
use netrain_formula_installer::receipt::InstallReceipt;
use netrain_formula_installer::source::SourceRequest;
use netrain_formula_installer::source::download::{HttpDownloader, SourceDownloader};
use netrain_formula_installer::stager::InstallPrefix;
use std::io::Write;
use std::time::Duration;

/// Host collaborators, replaced by fakes in tests.
struct Services<'a> {
    dirs: &'a dyn BaseDirs,
    executor: &'a dyn CommandExecutor,
    downloader: &'a dyn SourceDownloader,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity, cli.quiet);

    let services = Services {
        dirs: &SystemBaseDirs,
        executor: &SystemCommandExecutor,
        downloader: &HttpDownloader,
    };
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &services, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(
    cli: &Cli,
    services: &Services<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let descriptor = load_descriptor(cli.formula.as_deref())?;
    debug!("using formula for {} {}", descriptor.name(), descriptor.version());

    match &cli.command {
        Command::Install(args) => run_install(cli, &descriptor, args, services, stdout, stderr),
        Command::Test(args) => run_test(cli, &descriptor, args, services, stdout, stderr),
        Command::Caveats => {
            write_line(stdout, descriptor.caveats().render().trim_end());
            Ok(())
        }
        Command::Deps(args) => run_deps(&descriptor, args, stdout),
        Command::Info(args) => {
            let prefix = resolve_prefix(args, services.dirs, &descriptor)?;
            let receipt = InstallReceipt::read(&prefix.receipt_path())?;
            write_line(
                stdout,
                format_info(&descriptor, &prefix, receipt.as_ref()).trim_end(),
            );
            Ok(())
        }
    }
}

/// Loads the formula from `path`, or the bundled formula when absent.
fn load_descriptor(path: Option<&Utf8Path>) -> Result<PackageDescriptor> {
    let descriptor = match path {
        Some(path) => PackageDescriptor::load(path.as_std_path())?,
        None => PackageDescriptor::builtin()?,
    };
    Ok(descriptor)
}

fn run_install(
    cli: &Cli,
    descriptor: &PackageDescriptor,
    args: &InstallArgs,
    services: &Services<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let prefix = resolve_prefix(&args.prefix, services.dirs, descriptor)?;
    let request = install_request_for(cli, args);
    let context = InstallContext {
        executor: services.executor,
        downloader: services.downloader,
        cache_dir: cache_dir(services.dirs),
    };

    if !cli.quiet {
        write_line(
            stderr,
            format!(
                "Installing {} {} into {}...",
                descriptor.display_name(),
                descriptor.version(),
                prefix.root()
            ),
        );
    }

    let receipt = pipeline::install(descriptor, &prefix, &request, &context)?;

    write_line(stdout, success_message(&receipt));
    write_line(stdout, "");
    write_line(stdout, descriptor.caveats().render().trim_end());
    Ok(())
}

fn run_test(
    cli: &Cli,
    descriptor: &PackageDescriptor,
    args: &TestArgs,
    services: &Services<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let prefix = resolve_prefix(&args.prefix, services.dirs, descriptor)?;
    let config = harness_config_for(descriptor, args);

    if !cli.quiet {
        write_line(
            stderr,
            format!(
                "Testing {} at {} (grace {:?}, reap timeout {:?})...",
                descriptor.display_name(),
                prefix.root(),
                config.grace_period,
                config.reap_timeout
            ),
        );
    }

    let report = pipeline::verify(descriptor, &prefix, config)?;
    write_line(stdout, format_report(&report).trim_end());
    report.into_result()
}

fn run_deps(descriptor: &PackageDescriptor, args: &DepsArgs, stdout: &mut dyn Write) -> Result<()> {
    let text = if args.json {
        dependencies_json(descriptor.dependencies()).map_err(|e| {
            InstallerError::Io(std::io::Error::other(format!(
                "could not serialise dependencies: {e}"
            )))
        })?
    } else {
        format_dependencies(descriptor.dependencies())
    };
    write_line(stdout, text.trim_end());
    Ok(())
}

/// Determines the prefix from the CLI or falls back to the default keg.
fn resolve_prefix(
    args: &PrefixArgs,
    dirs: &dyn BaseDirs,
    descriptor: &PackageDescriptor,
) -> Result<InstallPrefix> {
    args.prefix
        .clone()
        .or_else(|| default_prefix(dirs, descriptor.name(), descriptor.version()))
        .map(InstallPrefix::new)
        .ok_or_else(|| InstallerError::PrefixUnavailable {
            reason: "could not determine default prefix; pass --prefix".to_owned(),
        })
}

fn cache_dir(dirs: &dyn BaseDirs) -> Utf8PathBuf {
    download_cache_dir(dirs).unwrap_or_else(|| {
        Utf8PathBuf::try_from(std::env::temp_dir())
            .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
            .join("netrain-formula")
    })
}

fn install_request_for(cli: &Cli, args: &InstallArgs) -> InstallRequest {
    let source = if let Some(dir) = &args.source_dir {
        SourceRequest::Directory(dir.clone())
    } else if let Some(archive) = &args.archive {
        SourceRequest::Archive(archive.clone())
    } else if args.head {
        SourceRequest::Head
    } else {
        SourceRequest::Release
    };
    InstallRequest {
        source,
        build: BuildConfig {
            jobs: args.jobs,
            verbosity: cli.verbosity,
        },
        skip_deps: args.skip_deps,
    }
}

fn harness_config_for(descriptor: &PackageDescriptor, args: &TestArgs) -> HarnessConfig {
    let mut config = HarnessConfig::from(descriptor.harness());
    if let Some(ms) = args.grace_period_ms {
        config.grace_period = Duration::from_millis(ms);
    }
    if let Some(ms) = args.reap_timeout_ms {
        config.reap_timeout = Duration::from_millis(ms);
    }
    if args.strict_exit {
        config.allow_nonzero_exit = false;
    }
    config
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
