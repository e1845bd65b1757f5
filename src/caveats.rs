//! Post-install caveats.

use serde::Deserialize;

/// Caveat fields as written in the formula's `[caveats]` table.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CaveatSettings {
    /// Command that runs the binary with elevated privileges.
    ///
    /// Defaults to `sudo <name>` when omitted.
    pub privilege_command: Option<String>,
    /// Flag that selects demo mode. Defaults to `--demo`.
    pub demo_flag: Option<String>,
}

/// Structured caveat fields for one package.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Caveats {
    /// Human-facing package name, e.g. `NetRain`.
    pub display_name: String,
    /// Command for normal, privileged operation.
    pub privilege_command: String,
    /// Command for unprivileged demo mode.
    pub demo_command: String,
}

impl Caveats {
    /// Render the caveats message shown after install.
    ///
    /// # Examples
    ///
    /// ```
    /// use netrain_formula::caveats::Caveats;
    ///
    /// let caveats = Caveats {
    ///     display_name: "NetRain".to_owned(),
    ///     privilege_command: "sudo netrain".to_owned(),
    ///     demo_command: "netrain --demo".to_owned(),
    /// };
    /// assert!(caveats.render().contains("  sudo netrain\n"));
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        render_caveats(
            &self.display_name,
            &self.privilege_command,
            &self.demo_command,
        )
    }
}

/// Format the caveats text from its fields.
#[must_use]
pub fn render_caveats(display_name: &str, privilege_command: &str, demo_command: &str) -> String {
    format!(
        concat!(
            "{} requires root privileges to capture network packets:\n",
            "  {}\n",
            "\n",
            "To run in demo mode without root privileges:\n",
            "  {}\n"
        ),
        display_name, privilege_command, demo_command
    )
}
