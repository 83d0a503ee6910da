//! Tracing initialization for binaries and tests embedding the store.
//!
//! The crate itself only emits `tracing` events; hosts that have no
//! subscriber of their own can call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` (defaulting to `info`), and setting
/// `LOG_FORMAT=json` switches to newline-delimited JSON output. Calling
/// this when a subscriber is already installed is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
