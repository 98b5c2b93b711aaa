//! Record export service.
//!
//! Reads every stored document back and writes it as a delimited file. The
//! column layout is rebuilt from the documents' own key order, so a load
//! followed by an export reproduces the source columns exactly.

use crate::io::formats::{CsvExportSink, delimiter_for_path};
use crate::io::traits::ExportSink;
use crate::models::{Document, StoredDocument};
use crate::storage::DocumentStore;
use crate::{Error, Result};
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::instrument;

/// Result of an export operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportResult {
    /// Number of rows written.
    pub exported: usize,
    /// Columns written, in order.
    pub columns: Vec<String>,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

impl ExportResult {
    /// Returns whether any rows were exported.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.exported > 0
    }
}

/// Returns the union of document keys in first-appearance order.
#[must_use]
pub fn column_layout<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for document in documents {
        for key in document.keys() {
            if seen.insert(key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

/// Service for exporting the collection to delimited files.
#[derive(Debug, Clone, Copy)]
pub struct ExportService {
    delimiter: u8,
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportService {
    /// Creates an export service writing `,`-delimited files.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Sets the delimiter used for non-`.tsv` files and writers.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Exports the whole collection to a file, replacing it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the file cannot be
    /// written.
    #[instrument(skip(self, store, path), fields(collection = store.collection(), path = %path.display()))]
    pub fn export_to_file(&self, store: &dyn DocumentStore, path: &Path) -> Result<ExportResult> {
        let io_error = |operation: &str, e: &dyn std::fmt::Display| Error::Io {
            operation: operation.to_string(),
            path: path.display().to_string(),
            cause: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error("create_export_dir", &e))?;
        }
        let file = std::fs::File::create(path).map_err(|e| io_error("create_export_file", &e))?;

        let delimiter = delimiter_for_path(path, self.delimiter);
        let mut writer = BufWriter::new(file);
        let mut result = Self::export_documents(store, &mut writer, delimiter)?;
        writer.flush().map_err(|e| io_error("flush_export_file", &e))?;

        result.output_path = Some(path.display().to_string());
        Ok(result)
    }

    /// Exports the whole collection to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or writing fails.
    pub fn export_to_writer<W: Write>(
        &self,
        store: &dyn DocumentStore,
        writer: W,
    ) -> Result<ExportResult> {
        Self::export_documents(store, writer, self.delimiter)
    }

    fn export_documents<W: Write>(
        store: &dyn DocumentStore,
        writer: W,
        delimiter: u8,
    ) -> Result<ExportResult> {
        // Store identity stays out of the exported rows
        let documents: Vec<Document> = store
            .find_all()?
            .into_iter()
            .map(StoredDocument::into_document)
            .collect();
        let columns = column_layout(&documents);

        let mut sink = Box::new(CsvExportSink::with_delimiter(
            writer,
            columns.clone(),
            delimiter,
        ));
        for document in &documents {
            sink.write(document)?;
        }
        sink.finalize()?;

        metrics::counter!("records_exported_total").increment(documents.len() as u64);
        tracing::info!(rows = documents.len(), columns = columns.len(), "Exported collection");

        Ok(ExportResult {
            exported: documents.len(),
            columns,
            output_path: None,
        })
    }
}
