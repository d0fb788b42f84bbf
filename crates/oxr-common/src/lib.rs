//! Shared utilities for the OpenXR provider: configuration, logging, error types.
//!
//! This crate provides common infrastructure used by the provider core, the
//! OpenXR backend and the command line tools.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod helpers;

pub use config::AppConfig;
pub use error::{Error, Result};

/// Initialize tracing with a default filter.
///
/// `RUST_LOG` wins over `default_level` when set. Safe to call more than once; later calls keep the first subscriber.
pub fn init_tracing_with_default(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
