//! Document store trait.
//!
//! The store is the single named collection holding the current set of
//! records. Loading replaces its whole contents; exporting reads every
//! document back.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Replace Semantics |
//! |---------|----------|-------------------|
//! | `SqliteDocumentStore` | Default; persisted | Delete-all then insert, or atomic swap |
//! | `MemoryDocumentStore` | Tests, dry runs | Delete-all then insert, or atomic swap |
//!
//! # Secondary Indexes
//!
//! Indexes are lookup accelerators only. They are declared non-unique and never
//! reject a write; duplicate encounters are detected through
//! [`DocumentStore::group_count`].

use crate::Result;
use crate::models::{Document, StoredDocument, Value};

/// Declaration of a secondary index over one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name, unique within the collection.
    pub name: String,
    /// Indexed field.
    pub field: String,
    /// Whether the index rejects duplicate keys.
    pub unique: bool,
}

impl IndexSpec {
    /// Declares a non-unique ascending index named `<field>_1`.
    #[must_use]
    pub fn non_unique(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("{field}_1"),
            field,
            unique: false,
        }
    }

    /// The index over `Name`.
    #[must_use]
    pub fn name_index() -> Self {
        Self::non_unique(crate::models::Field::Name.name())
    }

    /// The index over `Date of Admission`.
    #[must_use]
    pub fn admission_date_index() -> Self {
        Self::non_unique(crate::models::Field::DateOfAdmission.name())
    }
}

/// One group of an aggregation over several fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    /// Grouped values, in the order of the requested fields.
    pub key: Vec<Value>,
    /// Number of documents in the group.
    pub count: usize,
}

/// Counts reported by a replace operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Documents removed.
    pub deleted: usize,
    /// Documents inserted.
    pub inserted: usize,
}

/// Trait for document collection backends.
///
/// # Implementor Notes
///
/// - Methods use `&self`; use interior mutability for state
/// - `find_all` returns documents in insertion order
/// - `insert_many` must not add store identity to the document bodies
pub trait DocumentStore: Send + Sync {
    /// Returns the collection name.
    fn collection(&self) -> &str;

    /// Removes every document, returning how many were removed.
    fn delete_all(&self) -> Result<usize>;

    /// Inserts a batch of documents, returning how many were inserted.
    fn insert_many(&self, documents: &[Document]) -> Result<usize>;

    /// Returns every document in insertion order.
    fn find_all(&self) -> Result<Vec<StoredDocument>>;

    /// Returns documents whose `field` equals `value`.
    fn find_by(&self, field: &str, value: &Value) -> Result<Vec<StoredDocument>>;

    /// Declares a secondary index. Declaring an existing index is a no-op.
    fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// Lists declared secondary indexes.
    fn list_indexes(&self) -> Result<Vec<IndexSpec>>;

    /// Groups documents by `fields` and returns the groups holding more than
    /// one document, ordered by their first member.
    fn group_count(&self, fields: &[&str]) -> Result<Vec<GroupCount>>;

    /// Replaces the whole collection in one atomic step.
    fn swap_all(&self, documents: &[Document]) -> Result<ReplaceOutcome>;

    /// Returns the number of documents.
    fn count(&self) -> Result<usize> {
        Ok(self.find_all()?.len())
    }

    /// Deletes every document, then inserts `documents`.
    ///
    /// Not transactional: a failure during the insert leaves the collection
    /// empty or partially populated.
    fn replace_all(&self, documents: &[Document]) -> Result<ReplaceOutcome> {
        let deleted = self.delete_all()?;
        let inserted = self.insert_many(documents)?;
        Ok(ReplaceOutcome { deleted, inserted })
    }
}
