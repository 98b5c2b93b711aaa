//! Observability: structured logging through `tracing`.
//!
//! Metrics are recorded through the `metrics` facade at the storage and
//! service boundaries; without an installed recorder they are no-ops.

mod logging;

pub use logging::LoggingConfig;

use crate::config::{LogFormat, LoggingSettings};
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging from config settings.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the log file
/// cannot be opened.
pub fn init_from_settings(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    init(LoggingConfig::from_settings(settings, verbose))
}

/// Installs the global `tracing` subscriber.
///
/// Events go to the configured log file when one is set, otherwise to
/// stderr so stdout stays free for command output.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the log file
/// cannot be opened.
pub fn init(config: LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(init_failed("observability already initialized"));
    }

    let (writer, ansi) = match &config.file {
        Some(path) => (BoxMakeWriter::new(open_log_file(path)?), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let registry = tracing_subscriber::registry().with(config.filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(true),
            )
            .try_init(),
    };
    installed.map_err(|e| init_failed(&e.to_string()))?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| init_failed("failed to mark observability initialized"))
}

/// Opens a log file for appending, creating its directory first.
fn open_log_file(path: &Path) -> Result<Mutex<File>> {
    let io_error = |operation: &str, target: &Path, e: io::Error| Error::Io {
        operation: operation.to_string(),
        path: target.display().to_string(),
        cause: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create_log_dir", parent, e))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Mutex::new)
        .map_err(|e| io_error("open_log_file", path, e))
}

fn init_failed(cause: &str) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("loader.log");

        open_log_file(&path)
            .unwrap()
            .get_mut()
            .unwrap()
            .write_all(b"first\n")
            .unwrap();
        let mut second = open_log_file(&path).unwrap();
        let file = second.get_mut().unwrap();
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_reports_path() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened as a log file
        let err = open_log_file(dir.path()).err().unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }
}
