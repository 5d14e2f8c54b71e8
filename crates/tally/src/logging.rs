//! Log output for binaries built on Tally.
//!
//! Library crates only emit `tracing` events; installing a subscriber is
//! the application's decision, made once at startup through [`init`].

use tracing_subscriber::EnvFilter;

/// Installs a formatted subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g. `"info"` or
/// `"tally_session=debug,info"`) is used. Returns `false` if a global
/// subscriber was already installed, which is harmless.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
