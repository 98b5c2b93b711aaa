//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `HEALTHCARE_LOADER_*` environment variables, then command-line flags.
//!
//! ```toml
//! database = "/var/lib/healthcare/healthcare.db"
//! collection = "patients"
//! delimiter = ","
//! replace_mode = "delete_then_insert"
//! reject_duplicates = false
//!
//! [logging]
//! format = "json"
//! level = "info"
//! file = "/var/log/healthcare-loader.log"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application name used for platform directories.
const APP_NAME: &str = "healthcare-loader";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "HEALTHCARE_LOADER_CONFIG";

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "HEALTHCARE_LOADER_DATABASE";

/// Environment variable overriding the collection name.
pub const COLLECTION_ENV: &str = "HEALTHCARE_LOADER_COLLECTION";

/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "HEALTHCARE_LOADER_LOG_FORMAT";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "patients";

/// How a load replaces the previous collection contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceMode {
    /// Delete every document, then insert the new batch. A failure between
    /// the two steps leaves the collection empty or partially populated.
    #[default]
    DeleteThenInsert,
    /// Swap the contents in a single transaction.
    Atomic,
}

impl ReplaceMode {
    /// Parses a replace mode string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown modes.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "delete_then_insert" | "replace" => Ok(Self::DeleteThenInsert),
            "atomic" | "swap" => Ok(Self::Atomic),
            other => Err(Error::InvalidInput(format!("unknown replace mode '{other}'"))),
        }
    }

    /// Returns the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeleteThenInsert => "delete_then_insert",
            Self::Atomic => "atomic",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a log format, falling back to `Pretty` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Optional file to append logs to instead of stderr.
    pub file: Option<PathBuf>,
}

/// Main configuration for the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Path to the `SQLite` database holding the collection.
    pub database: PathBuf,
    /// Collection name.
    pub collection: String,
    /// Field delimiter of source and export files.
    pub delimiter: u8,
    /// How a load replaces previous contents.
    pub replace_mode: ReplaceMode,
    /// Whether a load fails before writing when the batch holds duplicate
    /// encounters.
    pub reject_duplicates: bool,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database: Option<String>,
    /// Collection name.
    pub collection: Option<String>,
    /// Field delimiter, a single character.
    pub delimiter: Option<String>,
    /// Replace mode.
    pub replace_mode: Option<ReplaceMode>,
    /// Pre-insert duplicate check.
    pub reject_duplicates: Option<bool>,
    /// Logging configuration.
    pub logging: Option<ConfigFileLogging>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<LogFormat>,
    /// Default filter directive.
    pub level: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            collection: DEFAULT_COLLECTION.to_string(),
            delimiter: b',',
            replace_mode: ReplaceMode::default(),
            reject_duplicates: false,
            logging: LoggingSettings::default(),
        }
    }
}

/// Returns `healthcare.db` inside the platform data directory, or in the
/// working directory when no home directory is known.
fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("healthcare.db"),
        |dirs| dirs.data_dir().join(APP_NAME).join("healthcare.db"),
    )
}

impl LoaderConfig {
    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Io {
            operation: "read_config_file".to_string(),
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/.config/healthcare-loader/` on Linux)
    /// 2. `~/.config/healthcare-loader/` for Unix compatibility on other platforms
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join(APP_NAME).join("config.toml");
        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join(APP_NAME)
            .join("config.toml");

        for candidate in [platform_config, xdg_config] {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default()
    }

    /// Resolves the configuration for a run.
    ///
    /// An explicit path (from `--config`) wins over `HEALTHCARE_LOADER_CONFIG`;
    /// without either the default locations are searched. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`resolve`](Self::resolve) with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded or an
    /// override is invalid.
    pub fn resolve_with(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let from_env = lookup(CONFIG_PATH_ENV).filter(|v| !v.trim().is_empty());
        let config = match (explicit, from_env) {
            (Some(path), _) => Self::load_from_file(path)?,
            (None, Some(path)) => Self::load_from_file(Path::new(&path))?,
            (None, None) => Self::load_default(),
        };
        config.with_env_overrides(lookup)
    }

    /// Applies `HEALTHCARE_LOADER_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an overridden collection name is blank.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(database) = lookup(DATABASE_ENV).filter(|v| !v.trim().is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(collection) = lookup(COLLECTION_ENV) {
            self = self.with_collection(collection)?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            self.logging.format = LogFormat::parse(&format);
        }
        Ok(self)
    }

    /// Converts a `ConfigFile` to `LoaderConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(database) = file.database {
            config.database = PathBuf::from(database);
        }
        if let Some(collection) = file.collection {
            config = config.with_collection(collection)?;
        }
        if let Some(delimiter) = file.delimiter {
            config.delimiter = parse_delimiter(&delimiter)?;
        }
        if let Some(mode) = file.replace_mode {
            config.replace_mode = mode;
        }
        if let Some(reject) = file.reject_duplicates {
            config.reject_duplicates = reject;
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            config.logging.level = logging.level;
            config.logging.file = logging.file.map(PathBuf::from);
        }

        Ok(config)
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Sets the collection name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is blank.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(Error::InvalidInput(
                "collection name cannot be empty".to_string(),
            ));
        }
        self.collection = collection.trim().to_string();
        Ok(self)
    }

    /// Sets the replace mode.
    #[must_use]
    pub const fn with_replace_mode(mut self, mode: ReplaceMode) -> Self {
        self.replace_mode = mode;
        self
    }
}

/// Parses a single-byte delimiter, accepting `\t` for tab.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless the value is exactly one ASCII
/// character.
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "\\t" | "\t" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        s => Err(Error::InvalidInput(format!(
            "delimiter must be a single ASCII character, got '{s}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.collection, "patients");
        assert_eq!(config.delimiter, b',');
        assert_eq!(config.replace_mode, ReplaceMode::DeleteThenInsert);
        assert!(!config.reject_duplicates);
        assert!(config.database.ends_with("healthcare.db"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database = "/tmp/encounters.db"
collection = "encounters"
delimiter = ";"
replace_mode = "atomic"
reject_duplicates = true

[logging]
format = "json"
level = "debug"
"#
        )
        .unwrap();

        let config = LoaderConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/encounters.db"));
        assert_eq!(config.collection, "encounters");
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.replace_mode, ReplaceMode::Atomic);
        assert!(config.reject_duplicates);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_from_file_rejects_unknown_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "host = \"localhost\"").unwrap();
        let err = LoaderConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = LoaderConfig::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = LoaderConfig::default()
            .with_env_overrides(env(&[
                (DATABASE_ENV, "/data/h.db"),
                (COLLECTION_ENV, "visits"),
                (LOG_FORMAT_ENV, "JSON"),
            ]))
            .unwrap();
        assert_eq!(config.database, PathBuf::from("/data/h.db"));
        assert_eq!(config.collection, "visits");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_env_blank_collection_rejected() {
        let result = LoaderConfig::default().with_env_overrides(env(&[(COLLECTION_ENV, "  ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let mut explicit = NamedTempFile::new().unwrap();
        writeln!(explicit, "collection = \"explicit\"").unwrap();
        let mut from_env = NamedTempFile::new().unwrap();
        writeln!(from_env, "collection = \"from_env\"").unwrap();

        let env_path = from_env.path().display().to_string();
        let lookup = env(&[(CONFIG_PATH_ENV, env_path.as_str())]);

        let config = LoaderConfig::resolve_with(Some(explicit.path()), &lookup).unwrap();
        assert_eq!(config.collection, "explicit");

        let config = LoaderConfig::resolve_with(None, &lookup).unwrap();
        assert_eq!(config.collection, "from_env");
    }

    #[test_case(",", b','; "comma")]
    #[test_case(";", b';'; "semicolon")]
    #[test_case("|", b'|'; "pipe")]
    #[test_case("\\t", b'\t'; "escaped tab")]
    fn test_parse_delimiter(raw: &str, expected: u8) {
        assert_eq!(parse_delimiter(raw).unwrap(), expected);
    }

    #[test_case(""; "empty")]
    #[test_case(",,"; "two characters")]
    #[test_case("§"; "non ascii")]
    fn test_parse_delimiter_rejects(raw: &str) {
        assert!(parse_delimiter(raw).is_err());
    }

    #[test_case("delete_then_insert", ReplaceMode::DeleteThenInsert; "snake case")]
    #[test_case("delete-then-insert", ReplaceMode::DeleteThenInsert; "kebab case")]
    #[test_case("Atomic", ReplaceMode::Atomic; "capitalised atomic")]
    #[test_case("swap", ReplaceMode::Atomic; "swap alias")]
    fn test_replace_mode_parse(raw: &str, expected: ReplaceMode) {
        assert_eq!(ReplaceMode::parse(raw).unwrap(), expected);
    }

    #[test]
    fn test_replace_mode_parse_unknown() {
        assert!(ReplaceMode::parse("upsert").is_err());
    }
}
