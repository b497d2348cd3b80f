//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global subscriber with `RUST_LOG` filtering, defaulting
/// to `info` when unset. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Initializes the global subscriber with an explicit default filter,
/// still overridable through `RUST_LOG`.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    // try_init so tests and embedders that already installed a subscriber
    // are left alone.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
