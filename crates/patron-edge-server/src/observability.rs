//! Tracing setup: a registry with a reloadable `EnvFilter` and a fmt layer.
//!
//! The subscriber is installed before configuration is read, at `info`. Once
//! `[logging]` is loaded, [`apply_logging`] swaps in the configured level.
//! `RUST_LOG` takes precedence over both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

const BOOTSTRAP_LEVEL: &str = "info";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let (filter, handle) = reload::Layer::new(filter_for(BOOTSTRAP_LEVEL));
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// Switches the live filter to the configured level.
pub fn apply_logging(config: &LoggingConfig) {
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    match handle.reload(filter_for(&config.level)) {
        Ok(()) if env_filter().is_some() => {
            tracing::debug!("RUST_LOG is set; logging.level ignored");
        }
        Ok(()) => tracing::debug!(level = %config.level, "Log level applied"),
        Err(e) => tracing::warn!(error = %e, "Failed to apply log level"),
    }
}

fn env_filter() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG")?;
    EnvFilter::try_from_default_env().ok()
}

fn filter_for(level: &str) -> EnvFilter {
    env_filter().unwrap_or_else(|| EnvFilter::new(level.to_ascii_lowercase()))
}
