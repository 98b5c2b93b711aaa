//! Record import service.
//!
//! Loads a delimited source into typed records and replaces the collection
//! contents with them.

use crate::config::ReplaceMode;
use crate::io::formats::{create_import_source, delimiter_for_path};
use crate::io::traits::ImportSource;
use crate::models::{Document, EncounterKey, Field, Record};
use crate::storage::{DocumentStore, ReplaceOutcome, ensure_lookup_indexes};
use crate::{Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::instrument;

/// Options for record import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// How the previous contents are replaced.
    pub replace_mode: ReplaceMode,
    /// Fail before writing when the batch holds duplicate encounters.
    pub reject_duplicates: bool,
}

impl ImportOptions {
    /// Sets the replace mode.
    #[must_use]
    pub const fn with_replace_mode(mut self, mode: ReplaceMode) -> Self {
        self.replace_mode = mode;
        self
    }

    /// Enables or disables the pre-insert duplicate check.
    #[must_use]
    pub const fn with_reject_duplicates(mut self, reject: bool) -> Self {
        self.reject_duplicates = reject;
        self
    }
}

/// A loaded source: its column layout and its records in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    /// Columns in source order.
    pub columns: Vec<Field>,
    /// Records in source order.
    pub records: Vec<Record>,
}

impl LoadedTable {
    /// Returns the number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Returns the column names in source order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|f| f.name().to_string()).collect()
    }

    /// Converts every record to a document keyed in source column order.
    #[must_use]
    pub fn to_documents(&self) -> Vec<Document> {
        self.records
            .iter()
            .map(|r| r.to_document(&self.columns))
            .collect()
    }

    /// Returns each encounter key held by more than one record, with its
    /// count, in order of first appearance.
    #[must_use]
    pub fn duplicate_encounters(&self) -> Vec<(EncounterKey, usize)> {
        let mut counts: HashMap<EncounterKey, usize> = HashMap::new();
        let mut order = Vec::new();
        for record in &self.records {
            let key = record.encounter_key();
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }

        order
            .into_iter()
            .filter_map(|key| {
                let count = counts.get(&key).copied().unwrap_or(0);
                (count > 1).then_some((key, count))
            })
            .collect()
    }
}

/// Result of an import operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Documents inserted.
    pub inserted: usize,
    /// Documents removed from the previous contents.
    pub deleted: usize,
    /// Column layout of the loaded source.
    pub columns: Vec<String>,
}

/// Service for loading records and writing them to a store.
#[derive(Debug, Clone, Copy)]
pub struct ImportService {
    delimiter: u8,
}

impl Default for ImportService {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportService {
    /// Creates an import service reading `,`-delimited files.
    #[must_use]
    pub const fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Sets the delimiter used for non-`.tsv` files and readers.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Loads every record of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, its header is invalid
    /// or any row fails to parse or coerce.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn load_file(&self, path: &Path) -> Result<LoadedTable> {
        let file = std::fs::File::open(path).map_err(|e| Error::Io {
            operation: "open_source".to_string(),
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;

        let mut source = create_import_source(file, delimiter_for_path(path, self.delimiter))?;
        Self::load_from_source(source.as_mut())
    }

    /// Loads every record from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or any row fails to parse
    /// or coerce.
    pub fn load_reader<R: Read + 'static>(&self, reader: R) -> Result<LoadedTable> {
        let mut source = create_import_source(reader, self.delimiter)?;
        Self::load_from_source(source.as_mut())
    }

    /// Drains a source. The first failing row aborts the load.
    ///
    /// # Errors
    ///
    /// Returns the first parse or coercion error.
    pub fn load_from_source(source: &mut dyn ImportSource) -> Result<LoadedTable> {
        let mut records = Vec::with_capacity(source.size_hint().unwrap_or(0));
        while let Some(record) = source.next()? {
            records.push(record);
        }

        let table = LoadedTable {
            columns: source.columns().to_vec(),
            records,
        };

        metrics::counter!("records_loaded_total").increment(table.row_count() as u64);
        tracing::info!(rows = table.row_count(), "Loaded source records");
        Ok(table)
    }

    /// Loads a file and replaces the store contents with its records.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails, duplicates are rejected, or the
    /// store fails. A store failure during a delete-then-insert replace may
    /// leave the collection empty or partial.
    pub fn import_into(
        &self,
        store: &dyn DocumentStore,
        path: &Path,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let table = self.load_file(path)?;
        Self::import_table(store, &table, options)
    }

    /// Replaces the store contents with an already loaded table, then
    /// declares the lookup indexes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateRecords`] when rejecting duplicates, or the
    /// store error.
    #[instrument(skip_all, fields(collection = store.collection(), rows = table.row_count(), mode = options.replace_mode.as_str()))]
    pub fn import_table(
        store: &dyn DocumentStore,
        table: &LoadedTable,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        if options.reject_duplicates {
            let duplicates = table.duplicate_encounters();
            if !duplicates.is_empty() {
                tracing::warn!(groups = duplicates.len(), "Rejecting batch with duplicate encounters");
                return Err(Error::DuplicateRecords {
                    groups: duplicates.len(),
                });
            }
        }

        let documents = table.to_documents();
        let ReplaceOutcome { deleted, inserted } = match options.replace_mode {
            ReplaceMode::DeleteThenInsert => store.replace_all(&documents)?,
            ReplaceMode::Atomic => store.swap_all(&documents)?,
        };
        ensure_lookup_indexes(store)?;

        tracing::info!(deleted, inserted, "Replaced collection contents");
        Ok(ImportResult {
            inserted,
            deleted,
            columns: table.column_names(),
        })
    }
}
