//! Storage layer abstraction.
//!
//! The store is an external document collection reached through a small set
//! of operations (delete-all, insert-many, find-all, index declaration and
//! grouping). [`DocumentStore`] is the seam; two backends implement it:
//!
//! - [`SqliteDocumentStore`]: the persisted collection
//! - [`MemoryDocumentStore`]: non-persistent, for tests and dry runs

// Allow significant_drop_tightening - holding the connection guard for the
// whole operation keeps statements and transactions simple.
#![allow(clippy::significant_drop_tightening)]

pub mod collection;
pub mod sqlite;
pub mod traits;

pub use collection::{MemoryDocumentStore, SqliteDocumentStore};
pub use traits::{DocumentStore, GroupCount, IndexSpec, ReplaceOutcome};

/// Declares the two non-unique lookup indexes on `Name` and
/// `Date of Admission`.
///
/// # Errors
///
/// Returns an error if the store rejects an index declaration.
pub fn ensure_lookup_indexes(store: &dyn DocumentStore) -> crate::Result<()> {
    store.create_index(&IndexSpec::name_index())?;
    store.create_index(&IndexSpec::admission_date_index())?;
    Ok(())
}
