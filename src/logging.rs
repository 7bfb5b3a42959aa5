//! Logging setup
//!
//! Installs the global tracing subscriber: console output in JSON or pretty
//! form, plus an optional JSON log file appended to across runs.

use crate::config::LogFormat;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Build a filter from RUST_LOG, falling back to the configured level
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Open a log file for appending, creating parent directories
pub fn open_log_file(path: impl AsRef<Path>) -> io::Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the global tracing subscriber
///
/// Console logs go to stderr so they never mix with piped output. When
/// `log_file` is set, JSON lines are also appended to that file.
pub fn init_tracing(log_level: &str, format: LogFormat, log_file: Option<&Path>) -> io::Result<()> {
    let console_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(env_filter(log_level))
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(env_filter(log_level))
            .boxed(),
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(env_filter(log_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        tracing::info!(path = %path.display(), "Logging to file");
    }
    Ok(())
}
