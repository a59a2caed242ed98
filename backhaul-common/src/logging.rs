//! Logging initialization
//!
//! Backhaul logs through `tracing`; binaries and tests call
//! [`init_logging`] once at startup. `RUST_LOG` overrides the default
//! filter when set.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with an env-filterable
/// stdout formatter.
///
/// Safe to call more than once; later calls are no-ops (tests share one
/// process-wide subscriber).
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
