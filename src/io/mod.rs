//! Import/Export I/O subsystem.
//!
//! Loads encounter records from delimited files and writes the collection
//! back out.
//!
//! # Architecture
//!
//! - **Format adapters** implement [`ImportSource`] and [`ExportSink`]
//! - **Validation layer** coerces raw values into typed [`Record`](crate::Record)s
//! - **Services** orchestrate parsing, validation and storage
//!
//! # Examples
//!
//! ## Load a file into the collection
//!
//! ```rust,ignore
//! use healthcare_loader::io::{ImportOptions, ImportService};
//!
//! let result = ImportService::new().import_into(&store, path, &ImportOptions::default())?;
//! println!("Inserted {} records", result.inserted);
//! ```
//!
//! ## Export the collection
//!
//! ```rust,ignore
//! use healthcare_loader::io::ExportService;
//!
//! let result = ExportService::new().export_to_file(&store, "exported.csv".as_ref())?;
//! println!("Exported {} records", result.exported);
//! ```

pub mod formats;
pub mod services;
pub mod traits;
pub mod validation;

// Re-exports for convenience
pub use formats::{CsvExportSink, CsvImportSource};
pub use services::export::{ExportResult, ExportService};
pub use services::import::{ImportOptions, ImportResult, ImportService, LoadedTable};
pub use traits::{ExportSink, ImportSource};
