//! NetRain formula installer library.
//!
//! This crate turns a [`netrain_formula::PackageDescriptor`] into an installed,
//! verified binary: it fetches and checksums the source, builds it with
//! cargo into a staging area, promotes the result into the install prefix,
//! and runs the verification harness against it. It is used by the
//! `netrain-formula` CLI binary and can be consumed programmatically for
//! testing.
//!
//! # Modules
//!
//! - [`builder`] - Cargo build orchestration
//! - [`cli`] - Command-line argument definitions
//! - [`deps`] - Command execution and build dependency probes
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Semantic error types
//! - [`git`] - Development branch cloning
//! - [`harness`] - Version and process lifecycle verification
//! - [`logging`] - Stderr logger behind the `log` facade
//! - [`output`] - Text rendering for CLI output
//! - [`pipeline`] - Install and verify orchestration
//! - [`process`] - Spawned process handles that are always reaped
//! - [`receipt`] - Install receipts recording what was installed
//! - [`source`] - Source download, checksum verification, and unpacking
//! - [`stager`] - Install prefix layout, staging, and promotion

pub mod builder;
pub mod cli;
pub mod deps;
pub mod dirs;
pub mod error;
pub mod git;
pub mod harness;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod receipt;
pub mod source;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
