//! Log sink setup for the binary.
//!
//! Library modules only emit `tracing` events. This module installs the
//! subscriber: a daily rolling file in `[logging] dir` carrying every event at
//! the configured level, plus a stderr layer for errors.

use crate::config::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// File name prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "conversion.log";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("cannot create log directory {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// The returned guard flushes the non-blocking writer on drop and must be
/// held until the process exits.
pub fn setup_logging(log_dir: &Path, verbose: bool) -> Result<WorkerGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(verbose)
        .with_line_number(verbose);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    tracing::debug!(dir = %log_dir.display(), verbose, "logging initialized");
    Ok(guard)
}

/// One entry describing the validated configuration for this run.
pub fn log_config(config: &Config) {
    tracing::info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        workers = config.workers,
        dark_mode = config.dark_mode,
        verbose = config.debug,
        lang = %config.lang,
        fonts = %config.font_family(),
        custom_css = %config
            .custom_css
            .as_ref()
            .map(|c| c.path.display().to_string())
            .unwrap_or_default(),
        image_rules = config.rules.len(),
        "configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn subscriber_installs_once() {
        let tmp = TempDir::new().unwrap();
        let guard = setup_logging(&tmp.path().join("logs"), true).unwrap();
        assert!(tmp.path().join("logs").is_dir());

        let err = setup_logging(&tmp.path().join("logs"), false).unwrap_err();
        assert!(matches!(err, LoggingError::Init(_)));
        drop(guard);
    }

    #[test]
    fn unwritable_log_dir_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let err = setup_logging(&blocker.join("logs"), false).unwrap_err();
        assert!(matches!(err, LoggingError::Io { .. }));
        assert!(err.to_string().contains("logs"));
    }
}
