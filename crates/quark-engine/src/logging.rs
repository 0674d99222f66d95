//! Tracing subscriber setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! caller's choice. These helpers cover the common cases.

use std::error::Error;

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (for example `"quark_engine=info"`).
///
/// Fails if a global subscriber is already installed.
pub fn try_init(default_directive: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .try_init()
}

/// Install a debug-level subscriber writing through the test harness.
/// Repeated calls are ignored.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_thread_names(true)
        .with_test_writer()
        .try_init();
}
