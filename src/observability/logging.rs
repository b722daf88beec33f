//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honour `RUST_LOG`, falling back to the verbosity flag
//! - Optionally mirror events into a log file
//!
//! # Design Decisions
//! - Console output is the compact human format
//! - Each output has its own filter; the log file always records debug events
//! - The log file is opened in append mode and never rotated

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "mux_proxy=info";
/// Default filter with `--verbose`.
const VERBOSE_FILTER: &str = "mux_proxy=debug,tower_http=debug";
/// Filter of the log file, independent of `--verbose` and `RUST_LOG`.
const FILE_FILTER: &str = "mux_proxy=debug";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    File { path: PathBuf, source: io::Error },
    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter directive for the given verbosity.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Open (creating if needed) the log file. Returns whether it was created.
fn open_log_file(path: &Path) -> Result<(File, bool), LoggingError> {
    let created = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::File {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((file, created))
}

/// Plain-text layer writing to `file` at debug level.
fn file_layer(file: File) -> impl Layer<Registry> + Send + Sync {
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(FILE_FILTER))
}

/// Install the global subscriber.
pub fn init(options: &LogOptions) -> Result<(), LoggingError> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(options.verbose)));

    let (file, created) = match &options.file {
        Some(path) => {
            let (file, created) = open_log_file(path)?;
            (Some(file_layer(file)), created)
        }
        None => (None, false),
    };

    tracing_subscriber::registry()
        .with(file)
        .with(tracing_subscriber::fmt::layer().compact().with_filter(console_filter))
        .try_init()?;

    if created {
        tracing::info!("Log file created!");
    }
    Ok(())
}
