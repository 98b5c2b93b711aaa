//! Data models for the loader.
//!
//! [`Record`] is the typed patient encounter produced by the loader;
//! [`Document`] is the ordered, typed representation held by the store.

mod document;
mod record;

pub use document::{DATE_TAG, Document, DocumentId, StoredDocument, Value};
pub use record::{EncounterKey, Field, FieldKind, Record};

#[cfg(test)]
pub(crate) use record::fixtures;
