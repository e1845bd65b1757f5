//! Verification harness tunables from the formula's `[harness]` table.
//!
//! Every blocking wait the harness performs is bounded by one of these
//! values. Omitted keys fall back to the defaults below, so a formula only
//! needs to spell out what it changes.

use serde::Deserialize;
use std::time::Duration;

/// Timing and exit-status policy for the verification harness.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessSettings {
    /// Delay between spawning the demo process and signalling it.
    pub grace_period_ms: u64,
    /// Upper bound on the wait for a signalled process to be reaped.
    pub reap_timeout_ms: u64,
    /// Upper bound on the `--version` invocation.
    pub version_timeout_ms: u64,
    /// Upper bound on the whole lifecycle check.
    pub overall_timeout_ms: u64,
    /// Whether the version check tolerates a non-zero exit status.
    pub allow_nonzero_exit: bool,
}

impl HarnessSettings {
    const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;
    const DEFAULT_REAP_TIMEOUT_MS: u64 = 1_000;
    const DEFAULT_VERSION_TIMEOUT_MS: u64 = 10_000;
    const DEFAULT_OVERALL_TIMEOUT_MS: u64 = 30_000;

    /// Grace period as a [`Duration`].
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Reap timeout as a [`Duration`].
    #[must_use]
    pub const fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }

    /// Version-check timeout as a [`Duration`].
    #[must_use]
    pub const fn version_timeout(&self) -> Duration {
        Duration::from_millis(self.version_timeout_ms)
    }

    /// Overall lifecycle timeout as a [`Duration`].
    #[must_use]
    pub const fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: Self::DEFAULT_GRACE_PERIOD_MS,
            reap_timeout_ms: Self::DEFAULT_REAP_TIMEOUT_MS,
            version_timeout_ms: Self::DEFAULT_VERSION_TIMEOUT_MS,
            overall_timeout_ms: Self::DEFAULT_OVERALL_TIMEOUT_MS,
            allow_nonzero_exit: true,
        }
    }
}
