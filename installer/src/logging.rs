//! Diagnostic logging for the CLI.
//!
//! Library modules emit records through the `log` facade. The binary
//! installs a `tracing-subscriber` formatter on standard error, which also
//! receives `log` records through its `tracing-log` bridge. `-v` raises the
//! level one step per flag; `-q` limits output to errors.

use log::LevelFilter;
use tracing_subscriber::filter::LevelFilter as SubscriberLevel;

/// Level filter for the given `-v` count and `-q` flag.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use netrain_formula_installer::logging::level_for;
///
/// assert_eq!(level_for(0, false), LevelFilter::Warn);
/// assert_eq!(level_for(2, false), LevelFilter::Debug);
/// assert_eq!(level_for(3, true), LevelFilter::Error);
/// ```
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr subscriber as the global logger.
///
/// Calling this more than once keeps the first subscriber and only
/// updates the `log` level.
pub fn init(verbosity: u8, quiet: bool) {
    let level = level_for(verbosity, quiet);
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(subscriber_level(level))
        .with_target(false)
        .without_time()
        .try_init();
    if installed.is_err() {
        log::debug!("logger already installed");
    }
    log::set_max_level(level);
}

fn subscriber_level(level: LevelFilter) -> SubscriberLevel {
    match level {
        LevelFilter::Off => SubscriberLevel::OFF,
        LevelFilter::Error => SubscriberLevel::ERROR,
        LevelFilter::Warn => SubscriberLevel::WARN,
        LevelFilter::Info => SubscriberLevel::INFO,
        LevelFilter::Debug => SubscriberLevel::DEBUG,
        LevelFilter::Trace => SubscriberLevel::TRACE,
    }
}
