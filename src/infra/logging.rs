use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "GITDECK_LOG";
const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "gitdeck.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("no state or cache directory available for logs")]
    NoLogDir,

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps the background log writer alive; drop it last.
pub struct LoggingGuard {
    _worker: WorkerGuard,
    pub log_dir: PathBuf,
}

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join("gitdeck").join("logs"))
}

/// Installs a daily-rolling file subscriber. stdout belongs to the UI, so
/// nothing is ever logged there.
pub fn init_logging(filter: Option<String>) -> Result<LoggingGuard, LoggingError> {
    let log_dir = default_log_dir().ok_or(LoggingError::NoLogDir)?;
    init_logging_in(&log_dir, filter)
}

pub fn init_logging_in(log_dir: &Path, filter: Option<String>) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let filter = filter
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(writer);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();

    Ok(LoggingGuard {
        _worker: worker,
        log_dir: log_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_the_log_directory() {
        let dir = tempdir().expect("tempdir");
        let log_dir = dir.path().join("nested").join("logs");
        let guard = init_logging_in(&log_dir, Some("not a [valid filter".to_string()))
            .expect("init logging");
        assert!(log_dir.is_dir());
        assert_eq!(guard.log_dir, log_dir);
    }
}
