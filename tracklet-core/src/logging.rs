//! Logging for tracklet
//!
//! Dispatch logs go to a daily-rotated file under the XDG state directory
//! (`~/.local/state/tracklet/`). Terminal dispatch failures are logged at
//! `error`, so the log doubles as the out-of-band failure channel for
//! embedding code.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

const LOG_FILE_PREFIX: &str = "tracklet.log";

/// Install the global file logger.
///
/// Fails if a global subscriber is already set. Keep the returned guard
/// alive for as long as logs should be flushed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    init_in(&Config::state_dir(), config)
}

/// Like [`init`], writing into `log_dir` instead of the state directory
pub fn init_in(log_dir: &Path, config: &LoggingConfig) -> Result<LoggingGuard> {
    let appender = file_appender(log_dir, config)?;

    // Writes go through a worker thread
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(level_filter(&config.level))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Daily appender under `log_dir`, pruned to `max_files` files
fn file_appender(log_dir: &Path, config: &LoggingConfig) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {}", e)))
}

/// `RUST_LOG` overrides the configured level
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Route logs into the libtest output capture.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level_filter("warn"))
        .with_test_writer()
        .try_init();
}

/// Flushes pending log lines when dropped
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
