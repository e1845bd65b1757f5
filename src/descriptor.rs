//! The package descriptor and its TOML formula file.
//!
//! A [`PackageDescriptor`] is loaded once and never mutated. Everything the
//! installer does (fetching, building, verifying, printing caveats) receives
//! the descriptor explicitly rather than reading shared state.

use crate::caveats::{CaveatSettings, Caveats};
use crate::checksum::SourceChecksum;
use crate::config::HarnessSettings;
use crate::dependencies::{BuildDependency, DependencySpec};
use crate::error::{FormulaError, Result};
use serde::Deserialize;
use std::path::Path;

/// Text of the NetRain formula compiled into the crate.
pub const BUILTIN_FORMULA: &str = include_str!("../formula/netrain.toml");

const DEFAULT_DEMO_FLAG: &str = "--demo";

/// Location of the upstream development branch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HeadSource {
    /// Git repository URL.
    pub url: String,
    /// Branch to clone.
    #[serde(default = "HeadSource::default_branch")]
    pub branch: String,
}

impl HeadSource {
    fn default_branch() -> String {
        "main".to_owned()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormulaFile {
    package: PackageTable,
    head: Option<HeadSource>,
    #[serde(default)]
    dependencies: Vec<BuildDependency>,
    #[serde(default)]
    caveats: CaveatSettings,
    #[serde(default)]
    harness: HarnessSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageTable {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    homepage: String,
    url: String,
    sha256: String,
    license: String,
    version: String,
}

/// Immutable description of one packaged release.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageDescriptor {
    name: String,
    display_name: String,
    description: String,
    homepage: String,
    url: String,
    checksum: SourceChecksum,
    license: String,
    version: String,
    head: Option<HeadSource>,
    dependencies: DependencySpec,
    caveats: CaveatSettings,
    harness: HarnessSettings,
}

impl PackageDescriptor {
    /// Load the formula compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled formula is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use netrain_formula::PackageDescriptor;
    ///
    /// let descriptor = PackageDescriptor::builtin()?;
    /// assert_eq!(descriptor.name(), "netrain");
    /// assert_eq!(descriptor.version_banner(), "NetRain v0.2.0");
    /// # Ok::<(), netrain_formula::FormulaError>(())
    /// ```
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_FORMULA)
    }

    /// Load a formula from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Read`] when the file cannot be read, or any
    /// parse and validation error from [`Self::from_toml`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FormulaError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate formula text.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Parse`] for TOML or schema errors and
    /// [`FormulaError::InvalidField`] or [`FormulaError::InvalidSha256Digest`]
    /// when a field fails validation.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: FormulaFile = toml::from_str(text).map_err(|e| FormulaError::Parse {
            reason: e.to_string(),
        })?;
        Self::from_file(file)
    }

    fn from_file(file: FormulaFile) -> Result<Self> {
        let FormulaFile {
            package,
            head,
            dependencies,
            caveats,
            harness,
        } = file;

        validate_name(&package.name)?;
        require_non_blank("package.version", &package.version)?;
        require_non_blank("package.url", &package.url)?;
        require_non_blank("package.license", &package.license)?;
        if let Some(head) = &head {
            require_non_blank("head.url", &head.url)?;
            require_non_blank("head.branch", &head.branch)?;
        }
        for dependency in &dependencies {
            require_non_blank("dependencies.name", &dependency.name)?;
        }

        let checksum = SourceChecksum::parse(&package.sha256)?;
        let display_name = package
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| package.name.clone());

        Ok(Self {
            name: package.name,
            display_name,
            description: package.description,
            homepage: package.homepage,
            url: package.url,
            checksum,
            license: package.license,
            version: package.version.trim().to_owned(),
            head,
            dependencies: dependencies.into_iter().collect(),
            caveats,
            harness,
        })
    }

    /// Package and binary name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-facing name used in banners and caveats.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Project homepage URL.
    #[must_use]
    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    /// Release source archive URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Checksum recorded for the release archive.
    #[must_use]
    pub fn checksum(&self) -> &SourceChecksum {
        &self.checksum
    }

    /// SPDX license expression.
    #[must_use]
    pub fn license(&self) -> &str {
        &self.license
    }

    /// Release version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Development branch, if the formula declares one.
    #[must_use]
    pub fn head(&self) -> Option<&HeadSource> {
        self.head.as_ref()
    }

    /// Declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &DependencySpec {
        &self.dependencies
    }

    /// Harness tunables.
    #[must_use]
    pub fn harness(&self) -> &HarnessSettings {
        &self.harness
    }

    /// Text the installed binary prints for `--version`.
    #[must_use]
    pub fn version_banner(&self) -> String {
        format!("{} v{}", self.display_name, self.version)
    }

    /// Flag that starts the binary in unprivileged demo mode.
    #[must_use]
    pub fn demo_flag(&self) -> &str {
        self.caveats
            .demo_flag
            .as_deref()
            .unwrap_or(DEFAULT_DEMO_FLAG)
    }

    /// Structured caveats for this package.
    #[must_use]
    pub fn caveats(&self) -> Caveats {
        let privilege_command = self
            .caveats
            .privilege_command
            .clone()
            .unwrap_or_else(|| format!("sudo {}", self.name));
        Caveats {
            display_name: self.display_name.clone(),
            privilege_command,
            demo_command: format!("{} {}", self.name, self.demo_flag()),
        }
    }
}

fn require_non_blank(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FormulaError::InvalidField {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    require_non_blank("package.name", name)?;
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid || name.starts_with('.') {
        return Err(FormulaError::InvalidField {
            field: "package.name",
            reason: format!("\"{name}\" is not a valid binary name"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
