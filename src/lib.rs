//! # healthcare-loader
//!
//! Loads patient-encounter records from a delimited file into a document
//! collection and exports them back out.
//!
//! The pipeline is strictly linear:
//!
//! 1. **Loader** ([`io::ImportService`]) parses the source file and coerces
//!    Age, Billing Amount and both dates into typed values.
//! 2. **Store** ([`storage::DocumentStore`]) replaces the whole collection with
//!    the new batch and keeps two non-unique lookup indexes.
//! 3. **Exporter** ([`io::ExportService`]) reads every document back and
//!    writes a file with the same column set and order.
//!
//! [`services::IntegrityService`] checks the data-integrity contract that
//! holds across those stages: complete fields, correct value types, no
//! duplicate encounters and round-trip fidelity.
//!
//! ## Example
//!
//! ```rust,ignore
//! use healthcare_loader::io::{ExportService, ImportOptions, ImportService};
//! use healthcare_loader::storage::SqliteDocumentStore;
//!
//! let store = SqliteDocumentStore::open("healthcare.db", "patients")?;
//! let result = ImportService::new().import_into(&store, "healthcare_dataset.csv".as_ref(), &ImportOptions::default())?;
//! println!("Inserted {} records", result.inserted);
//! ExportService::new().export_to_file(&store, "exported.csv".as_ref())?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{LoaderConfig, ReplaceMode};
pub use models::{Document, DocumentId, Field, Record, StoredDocument, Value};
pub use services::{IntegrityReport, IntegrityService, Pipeline, PipelineOutcome};
pub use storage::{DocumentStore, IndexSpec, MemoryDocumentStore, SqliteDocumentStore};

/// Error type for loader operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Io` | Source or target file cannot be opened, read or written |
/// | `Parse` | The delimited file is malformed (ragged rows, bad quoting) |
/// | `InvalidInput` | Missing/unknown headers, malformed documents, bad names |
/// | `Coercion` | Age, Billing Amount or a date cannot be converted |
/// | `Connection` | The document store cannot be opened |
/// | `OperationFailed` | A store read or write fails |
/// | `DuplicateRecords` | The pre-insert uniqueness check finds duplicates |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A file-level I/O failure.
    #[error("{operation} '{path}' failed: {cause}")]
    Io {
        /// The operation that failed (e.g. `open_source`).
        operation: String,
        /// The file involved.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// The delimited source could not be parsed.
    ///
    /// `row` is the 1-based data row (header excluded) when known.
    #[error("parse error at row {row}: {cause}")]
    Parse {
        /// Data row where parsing failed (0 for the header).
        row: usize,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A required column is missing from the header row
    /// - The header contains unknown or repeated columns
    /// - A stored document lacks a field or carries the wrong value type
    /// - A collection or index name is not a plain identifier
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A field could not be coerced to its semantic type.
    #[error("row {row}: cannot convert {column} value '{value}' to {expected}")]
    Coercion {
        /// Data row (1-based, header excluded).
        row: usize,
        /// Column name.
        column: String,
        /// The raw value as read from the file.
        value: String,
        /// The expected type (e.g. `integer`, `date`).
        expected: String,
    },

    /// The document store could not be reached.
    #[error("cannot connect to '{target}': {cause}")]
    Connection {
        /// Database path or description.
        target: String,
        /// The underlying cause.
        cause: String,
    },

    /// A store operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The batch contains records sharing Name, Date of Admission and
    /// Discharge Date.
    #[error("{groups} duplicate encounter group(s) found")]
    DuplicateRecords {
        /// Number of duplicate groups.
        groups: usize,
    },
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;
