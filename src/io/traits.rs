//! Format adapter seams for the loader and the exporter.

use crate::Result;
use crate::models::{Document, Field, Record};

/// Source of imported records.
///
/// Implementations read rows from a specific format, coerce them and yield
/// typed [`Record`]s one at a time in source order.
///
/// # Example Implementation
///
/// ```rust,ignore
/// impl ImportSource for TsvSource {
///     fn columns(&self) -> &[Field] {
///         &self.columns
///     }
///
///     fn next(&mut self) -> Result<Option<Record>> {
///         // Read next line, split on tabs, coerce fields
///     }
/// }
/// ```
pub trait ImportSource {
    /// Returns the column layout of the source, in source order.
    fn columns(&self) -> &[Field];

    /// Reads the next record from the source.
    ///
    /// Returns `Ok(None)` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or coercion fails or I/O errors occur.
    fn next(&mut self) -> Result<Option<Record>>;

    /// Returns an estimate of the total number of records.
    ///
    /// Returns `None` if unknown.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// Destination of exported documents.
///
/// The column layout is fixed when the sink is built. Documents are written
/// as rows in that layout; keys outside it are ignored and missing keys
/// become empty fields.
pub trait ExportSink {
    /// Writes one document as a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn write(&mut self, document: &Document) -> Result<()>;

    /// Flushes the sink. Nothing may be written afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finalize(self: Box<Self>) -> Result<()>;
}
