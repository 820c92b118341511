//! Logging setup.
//!
//! Console output follows the requested level (or `RUST_LOG`); the run log
//! file in the output directory always receives debug and above.

use crate::FwCheckError;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(run_log: &Path, console_level: &str, color: bool) -> Result<(), FwCheckError> {
    let file = File::create(run_log).map_err(|e| FwCheckError::Io {
        context: format!("creating {}", run_log.display()),
        source: e,
    })?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(color)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| FwCheckError::Configuration(format!("logging setup failed: {}", e)))
}
