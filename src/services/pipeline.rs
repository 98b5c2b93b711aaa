//! The load, replace and export pipeline.
//!
//! Stages run strictly in sequence and each completes before the next
//! begins. Any failure aborts the run; nothing is retried.

use crate::Result;
use crate::config::LoaderConfig;
use crate::io::{ExportResult, ExportService, ImportOptions, ImportResult, ImportService};
use crate::storage::DocumentStore;
use std::path::PathBuf;
use tracing::instrument;

/// Message reported once the records are stored.
pub const INSERTED_MESSAGE: &str = "Records inserted successfully";

/// Message reported once the export file is written.
pub const EXPORTED_MESSAGE: &str = "Records exported successfully";

/// Inputs of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Source file.
    pub source: PathBuf,
    /// Export file, if an export follows the load.
    pub export: Option<PathBuf>,
    /// Replace options.
    pub options: ImportOptions,
    /// Delimiter for non-`.tsv` files.
    pub delimiter: u8,
}

impl PipelineConfig {
    /// Creates a load-only run with default options.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            export: None,
            options: ImportOptions::default(),
            delimiter: b',',
        }
    }

    /// Creates a run using the loader configuration's options.
    #[must_use]
    pub fn from_loader_config(config: &LoaderConfig, source: impl Into<PathBuf>) -> Self {
        Self {
            options: ImportOptions {
                replace_mode: config.replace_mode,
                reject_duplicates: config.reject_duplicates,
            },
            delimiter: config.delimiter,
            ..Self::new(source)
        }
    }

    /// Adds an export stage.
    #[must_use]
    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export = Some(path.into());
        self
    }

    /// Sets the replace options.
    #[must_use]
    pub const fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }
}

/// Results of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Load and replace result.
    pub import: ImportResult,
    /// Export result, when an export ran.
    pub export: Option<ExportResult>,
}

/// Runs the pipeline against a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline;

impl Pipeline {
    /// Loads the source, replaces the collection, then optionally exports it.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage.
    #[instrument(skip_all, fields(source = %config.source.display(), collection = store.collection()))]
    pub fn run(store: &dyn DocumentStore, config: &PipelineConfig) -> Result<PipelineOutcome> {
        let import = ImportService::new()
            .with_delimiter(config.delimiter)
            .import_into(store, &config.source, &config.options)?;
        tracing::info!(inserted = import.inserted, "{INSERTED_MESSAGE}");

        let export = match &config.export {
            Some(path) => {
                let result = ExportService::new()
                    .with_delimiter(config.delimiter)
                    .export_to_file(store, path)?;
                tracing::info!(exported = result.exported, path = %path.display(), "{EXPORTED_MESSAGE}");
                Some(result)
            },
            None => None,
        };

        Ok(PipelineOutcome { import, export })
    }
}
