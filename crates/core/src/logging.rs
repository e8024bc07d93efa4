//! Structured logging bootstrap, shared by every binary in the workspace.
//! Mirrors the teacher's own `main.rs` bootstrap (`tracing_subscriber::fmt()
//! .json().init()`), generalized to respect `RUST_LOG` so individual
//! consumers/workers can be turned up without a redeploy.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global `tracing` subscriber as JSON lines on stdout,
/// honoring `RUST_LOG` (defaulting to `info`) the way every teacher service
/// does in production.
///
/// Call once, at the top of `main`. Panics if a subscriber is already set,
/// the same contract `tracing_subscriber::fmt().init()` carries.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to install global tracing subscriber");
}
