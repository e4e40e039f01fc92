//! Structured logging setup
//!
//! Installs a `tracing-subscriber` registry filtered by `RUST_LOG`
//! (default: `info`). Safe to call more than once; later calls are no-ops.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// Uses `RUST_LOG` for filtering (e.g. `RUST_LOG=smriti=debug`). Returns
/// quietly if a subscriber is already installed, so tests and embedding
/// applications can both call it.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
