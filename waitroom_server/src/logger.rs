//! # Logging Setup
//!
//! Console output plus, when a log directory is configured, a JSON file layer
//! rotated daily through a non-blocking writer. `RUST_LOG` takes precedence
//! over the configured level.

use anyhow::{Result, anyhow};
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "device-waiting-room";

/// Builds the filter from `RUST_LOG`, falling back to `log_level`.
pub fn env_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow!("Invalid log level '{}': {}", log_level, e))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn setup_logging(log_level: &str, log_dir: Option<&Path>, json_console: bool) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(log_level)?;

    let console_layer = if json_console {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let (writer, guard) = non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!(level = log_level, dir = ?log_dir, "Logging initialized");
    Ok(guard)
}
