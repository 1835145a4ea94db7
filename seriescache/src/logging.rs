//! Logging setup for binaries and simulations embedding the cache.
//!
//! The library itself only emits `tracing` events. Hosts that do not install
//! their own subscriber can call [`init_logging`] once at startup.
//!
//! `RUST_LOG` overrides the configured level when set.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Cannot open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("A global subscriber is already installed: {0}")]
    Init(#[from] TryInitError),
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `seriescache=debug`.
    pub level: String,
    /// Optional file receiving a copy of every event (without colours).
    pub file: Option<PathBuf>,
    /// Colourise terminal output.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

/// Keeps the background file writer alive. Drop it on shutdown to flush.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn parse_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    Ok(EnvFilter::try_new(level)?)
}

/// Install a global subscriber: terminal output on stderr plus an optional
/// non-blocking file writer.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.level)?,
    };

    let terminal = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_ansi(config.ansi)
        .with_writer(io::stderr);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = open_file_writer(path)?;
            let layer = fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal)
        .with(file_layer)
        .try_init()?;

    Ok(LogGuard { _file: guard })
}

fn open_file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_error = |source| LoggingError::File {
        path: path.to_path_buf(),
        source,
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = path.file_name().ok_or_else(|| {
        file_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path has no file name",
        ))
    })?;

    std::fs::create_dir_all(&directory).map_err(file_error)?;
    let appender = tracing_appender::rolling::never(&directory, name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(config.file.is_none());
        assert!(config.ansi);
    }

    #[test]
    fn test_builder() {
        let config = LogConfig::default()
            .with_level("seriescache=debug")
            .with_file("/tmp/seriescache.log")
            .with_ansi(false);
        assert_eq!(config.level, "seriescache=debug");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/seriescache.log")));
        assert!(!config.ansi);
    }

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("info,seriescache=trace").is_ok());
        assert!(matches!(
            parse_filter("seriescache=loud"),
            Err(LoggingError::Filter(_))
        ));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("loader.log");

        let (_writer, _guard) = open_file_writer(&path).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_file_writer_rejects_bare_root() {
        let err = open_file_writer(Path::new("/")).err().unwrap();
        assert!(matches!(err, LoggingError::File { .. }));
    }
}
