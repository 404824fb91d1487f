//! Tracing subscriber setup. `RUST_LOG` filters, `info` otherwise.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Returns false if one is already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
