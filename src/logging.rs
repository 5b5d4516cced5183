//! Logging setup for test binaries
//!
//! The library only emits `tracing` events; test suites that want to see
//! them call [`init_test_logging`] at the top of each test.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "pgharness=info";

/// Install a fmt subscriber writing through libtest's capture
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
