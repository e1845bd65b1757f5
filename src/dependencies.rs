//! Declared build-time and run-time dependencies.
//!
//! The set is pure metadata handed to the host resolver. Each build
//! dependency may also name a probe command that the installer runs before
//! building to confirm the tool is on `PATH`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// When a dependency is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyRole {
    /// Needed only to compile the package.
    Build,
    /// Needed whenever the installed binary runs.
    Runtime,
}

impl fmt::Display for DependencyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => f.write_str("build"),
            Self::Runtime => f.write_str("runtime"),
        }
    }
}

/// One `(name, role)` pair, with an optional probe command.
///
/// Ordering and equality consider the name and role only, so two
/// declarations of the same pair collapse in a [`DependencySpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDependency {
    /// Package name as the host package manager knows it.
    pub name: String,
    /// Build or runtime.
    pub role: DependencyRole,
    /// Command and arguments whose success shows the tool is available.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probe: Vec<String>,
}

impl BuildDependency {
    /// Create a dependency without a probe.
    #[must_use]
    pub fn new(name: impl Into<String>, role: DependencyRole) -> Self {
        Self {
            name: name.into(),
            role,
            probe: Vec::new(),
        }
    }

    /// Split the probe into program and arguments, if one is declared.
    #[must_use]
    pub fn probe_command(&self) -> Option<(&str, Vec<&str>)> {
        let (program, args) = self.probe.split_first()?;
        Some((program.as_str(), args.iter().map(String::as_str).collect()))
    }
}

impl PartialEq for BuildDependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.role == other.role
    }
}

impl Eq for BuildDependency {}

impl PartialOrd for BuildDependency {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuildDependency {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.role, &self.name).cmp(&(other.role, &other.name))
    }
}

impl fmt::Display for BuildDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

/// The dependency set declared by a formula.
///
/// # Examples
///
/// ```
/// use netrain_formula::dependencies::{BuildDependency, DependencyRole, DependencySpec};
///
/// let spec = DependencySpec::from_iter([
///     BuildDependency::new("rust", DependencyRole::Build),
///     BuildDependency::new("libpcap", DependencyRole::Runtime),
///     BuildDependency::new("rust", DependencyRole::Build),
/// ]);
/// assert_eq!(spec.len(), 2);
/// assert_eq!(spec.runtime().map(|d| d.name.as_str()).collect::<Vec<_>>(), ["libpcap"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySpec {
    entries: BTreeSet<BuildDependency>,
}

impl DependencySpec {
    /// Iterate over every declared dependency.
    pub fn iter(&self) -> impl Iterator<Item = &BuildDependency> {
        self.entries.iter()
    }

    /// Iterate over build-time dependencies.
    pub fn build(&self) -> impl Iterator<Item = &BuildDependency> {
        self.with_role(DependencyRole::Build)
    }

    /// Iterate over run-time dependencies.
    pub fn runtime(&self) -> impl Iterator<Item = &BuildDependency> {
        self.with_role(DependencyRole::Runtime)
    }

    /// Number of distinct `(name, role)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no dependencies are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn with_role(&self, role: DependencyRole) -> impl Iterator<Item = &BuildDependency> {
        self.entries.iter().filter(move |dep| dep.role == role)
    }
}

impl FromIterator<BuildDependency> for DependencySpec {
    fn from_iter<I: IntoIterator<Item = BuildDependency>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DependencySpec {
    type Item = &'a BuildDependency;
    type IntoIter = std::collections::btree_set::Iter<'a, BuildDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
