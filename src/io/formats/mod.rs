//! Format adapters for import/export.
//!
//! Each format implements the [`ImportSource`] and/or
//! [`ExportSink`](super::traits::ExportSink) traits.

pub mod csv;

pub use self::csv::{CsvExportSink, CsvImportSource};

use crate::Result;
use std::io::Read;
use std::path::Path;

use super::traits::ImportSource;

/// Picks the delimiter for a file: tab for `.tsv`, `default` otherwise.
#[must_use]
pub fn delimiter_for_path(path: &Path, default: u8) -> u8 {
    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    if is_tsv { b'\t' } else { default }
}

/// Creates an import source over a delimited reader.
///
/// # Errors
///
/// Returns an error if the header row is unreadable or does not name every
/// encounter column exactly once.
pub fn create_import_source<R: Read + 'static>(
    reader: R,
    delimiter: u8,
) -> Result<Box<dyn ImportSource>> {
    Ok(Box::new(CsvImportSource::with_delimiter(reader, delimiter)?))
}
