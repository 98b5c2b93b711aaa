//! Structured logging configuration.

use crate::config::{LogFormat, LoggingSettings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor a configured level is set.
const DEFAULT_LEVEL: &str = "info";

/// Filter used with `--verbose`.
const VERBOSE_LEVEL: &str = "debug";

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds the logging configuration from settings.
    ///
    /// `RUST_LOG` takes precedence. Otherwise `--verbose` selects `debug`,
    /// then the configured level, then `info`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let fallback = if verbose {
            VERBOSE_LEVEL
        } else {
            settings.level.as_deref().unwrap_or(DEFAULT_LEVEL)
        };

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

        Self {
            format: settings.format,
            filter,
            file: settings.file.clone(),
        }
    }
}
