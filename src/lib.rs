//! Package formula for the NetRain network monitor.
//!
//! This crate holds the declarative half of the formula: the immutable
//! [`PackageDescriptor`], its [`DependencySpec`], the post-install
//! [`Caveats`], and the [`HarnessSettings`] that bound the verification
//! harness. The `netrain-formula-installer` crate consumes these values to
//! fetch, build, stage, and verify the binary.
//!
//! # Modules
//!
//! - [`caveats`] - Post-install message rendering
//! - [`checksum`] - Source archive digests and the unpinned placeholder
//! - [`config`] - Verification harness tunables
//! - [`dependencies`] - Build and runtime dependency declarations
//! - [`descriptor`] - Formula file loading and the package descriptor
//! - [`error`] - Formula loading errors

pub mod caveats;
pub mod checksum;
pub mod config;
pub mod dependencies;
pub mod descriptor;
pub mod error;

pub use caveats::Caveats;
pub use config::HarnessSettings;
pub use dependencies::{BuildDependency, DependencyRole, DependencySpec};
pub use descriptor::{HeadSource, PackageDescriptor};
pub use error::FormulaError;
