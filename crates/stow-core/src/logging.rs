//! JSON log output for production hosts.
//!
//! Only compiled with the `tracing-json` feature. Library code logs through
//! `tracing` macros and never installs a subscriber itself; binaries call
//! [`init_json`] once at startup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "STOW_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Install a global JSON subscriber filtered by [`LOG_ENV`].
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_json() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(false)
        .try_init()
        .is_ok()
}
