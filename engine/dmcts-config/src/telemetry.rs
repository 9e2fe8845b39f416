//! Tracing subscriber setup for hosts embedding the engine.

use anyhow::{anyhow, Result};

/// Install a global `fmt` subscriber filtered at `level`.
///
/// `RUST_LOG` takes precedence over `level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
