//! Tracing subscriber setup for binaries and examples embedding the brain
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! the composition root's call. This helper wires the usual fmt layer
//! with `RUST_LOG` filtering (default `info`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Returns quietly if a global subscriber is already set, so tests can
/// call it repeatedly.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
