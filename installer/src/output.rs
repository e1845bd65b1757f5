//! Output formatting for the formula CLI.
//!
//! Everything the CLI prints to stdout is built here as plain strings so
//! it can be tested without running commands.

use crate::harness::VerificationReport;
use crate::receipt::{InstallReceipt, SourceOrigin};
use crate::stager::InstallPrefix;
use netrain_formula::{DependencySpec, PackageDescriptor};
use std::fmt::Write as _;

/// Format a success message after installation.
#[must_use]
pub fn success_message(receipt: &InstallReceipt) -> String {
    format!(
        "Successfully installed {} {} to {}",
        receipt.name, receipt.version, receipt.artifact
    )
}

/// One line per check, followed by a summary line.
///
/// ```text
/// version: ok (found "NetRain v0.2.0")
/// lifecycle: FAILED (process lifecycle check failed: ...)
/// 1 of 2 checks passed
/// ```
#[must_use]
pub fn format_report(report: &VerificationReport) -> String {
    let mut text = String::new();
    for outcome in report.outcomes() {
        let line = match &outcome.result {
            Ok(summary) => format!("{}: ok ({summary})", outcome.check),
            Err(err) => format!("{}: FAILED ({err})", outcome.check),
        };
        text.push_str(&line);
        text.push('\n');
    }
    let passed = report.outcomes().iter().filter(|o| o.passed()).count();
    let _ = writeln!(
        text,
        "{passed} of {} checks passed",
        report.outcomes().len()
    );
    text
}

/// Human-readable dependency listing, one `name (role)` per line.
#[must_use]
pub fn format_dependencies(spec: &DependencySpec) -> String {
    spec.iter().map(|dependency| format!("{dependency}\n")).collect()
}

/// Machine-readable dependency listing.
///
/// # Errors
///
/// Returns a serialisation error, which cannot happen for well-formed
/// dependency values.
pub fn dependencies_json(spec: &DependencySpec) -> serde_json::Result<String> {
    let entries: Vec<_> = spec.iter().collect();
    serde_json::to_string_pretty(&entries)
}

/// Formula summary plus install status at `prefix`.
#[must_use]
pub fn format_info(
    descriptor: &PackageDescriptor,
    prefix: &InstallPrefix,
    receipt: Option<&InstallReceipt>,
) -> String {
    let mut text = format!("{} {}\n", descriptor.display_name(), descriptor.version());
    if !descriptor.description().is_empty() {
        let _ = writeln!(text, "{}", descriptor.description());
    }
    if !descriptor.homepage().is_empty() {
        let _ = writeln!(text, "Homepage: {}", descriptor.homepage());
    }
    let _ = writeln!(text, "License: {}", descriptor.license());
    let _ = writeln!(text, "Source: {}", descriptor.url());
    match descriptor.checksum().digest() {
        Some(digest) => {
            let _ = writeln!(text, "Checksum: sha256 {digest}");
        }
        None => text.push_str("Checksum: unpinned\n"),
    }
    if let Some(head) = descriptor.head() {
        let _ = writeln!(text, "Head: {} ({})", head.url, head.branch);
    }
    let _ = writeln!(text, "Prefix: {}", prefix.root());
    match receipt {
        Some(receipt) => {
            let _ = writeln!(
                text,
                "Installed: {} from {}",
                receipt.artifact,
                describe_origin(&receipt.source)
            );
        }
        None => text.push_str("Installed: no\n"),
    }
    text
}

fn describe_origin(origin: &SourceOrigin) -> String {
    match origin {
        SourceOrigin::Archive { location, .. } => format!("archive {location}"),
        SourceOrigin::Head { url, branch } => format!("{url} ({branch})"),
        SourceOrigin::Local { path } => format!("local sources at {path}"),
    }
}
