//! Tracing setup for the `ledger` binary

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber
///
/// `RUST_LOG` wins; otherwise `fallback` (the settings `log_level`) is used.
/// Calling this twice is harmless.
pub fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
