//! Tracing subscriber setup for hosts embedding the loader.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::Error;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a compact stderr subscriber filtered by `RUST_LOG`.
///
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<(), Error> {
    init_with_filter(DEFAULT_FILTER)
}

/// Like [`init`], with `fallback` as the filter when `RUST_LOG` is unset.
pub fn init_with_filter(fallback: &str) -> Result<(), Error> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| Error::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
