//! Logging initialization for the herald binaries.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// `level` is the default filter directive; `RUST_LOG` overrides it when set.
/// Call once per process, before anything logs.
pub fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(true)
        .init();
}
