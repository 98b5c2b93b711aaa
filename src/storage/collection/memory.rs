//! In-memory document collection.
//!
//! Non-persistent implementation of [`DocumentStore`] for tests and dry runs.
//! Secondary indexes are `BTreeMap`s from the canonical JSON text of a value
//! to the ids holding it.

use crate::models::{Document, DocumentId, StoredDocument, Value};
use crate::storage::sqlite::timed;
use crate::storage::traits::{DocumentStore, GroupCount, IndexSpec, ReplaceOutcome};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "memory";

type IndexEntries = BTreeMap<String, Vec<DocumentId>>;

#[derive(Debug, Default)]
struct Collection {
    documents: BTreeMap<DocumentId, Document>,
    next_id: i64,
    indexes: Vec<(IndexSpec, IndexEntries)>,
}

impl Collection {
    fn insert(&mut self, document: Document) -> DocumentId {
        self.next_id += 1;
        let id = DocumentId::new(self.next_id);
        for (spec, entries) in &mut self.indexes {
            entries
                .entry(index_key(document.get(&spec.field)))
                .or_default()
                .push(id);
        }
        self.documents.insert(id, document);
        id
    }

    fn clear(&mut self) -> usize {
        let removed = self.documents.len();
        self.documents.clear();
        for (_, entries) in &mut self.indexes {
            entries.clear();
        }
        removed
    }
}

/// Canonical key of a value inside an index: its extended-JSON text.
fn index_key(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.to_json().ok())
        .unwrap_or(serde_json::Value::Null)
        .to_string()
}

/// In-memory document collection.
///
/// Uses `RwLock` for thread-safe access. Data is not persisted between runs.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    name: String,
    inner: RwLock<Collection>,
}

impl MemoryDocumentStore {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            name: collection.into(),
            inner: RwLock::new(Collection::default()),
        }
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, Collection>> {
        self.inner.read().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, Collection>> {
        self.inner.write().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    /// Rejects documents the persisted backend could not store either.
    fn check_encodable(documents: &[Document]) -> Result<()> {
        for document in documents {
            for (_, value) in document.iter() {
                value.to_json()?;
            }
        }
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new("patients")
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn collection(&self) -> &str {
        &self.name
    }

    fn delete_all(&self) -> Result<usize> {
        timed(BACKEND, "delete_all", || Ok(self.write("delete_all")?.clear()))
    }

    fn insert_many(&self, documents: &[Document]) -> Result<usize> {
        timed(BACKEND, "insert_many", || {
            Self::check_encodable(documents)?;
            let mut collection = self.write("insert_many")?;
            for document in documents {
                collection.insert(document.clone());
            }
            Ok(documents.len())
        })
    }

    fn find_all(&self) -> Result<Vec<StoredDocument>> {
        timed(BACKEND, "find_all", || {
            let collection = self.read("find_all")?;
            Ok(collection
                .documents
                .iter()
                .map(|(id, document)| StoredDocument {
                    id: *id,
                    document: document.clone(),
                })
                .collect())
        })
    }

    fn find_by(&self, field: &str, value: &Value) -> Result<Vec<StoredDocument>> {
        timed(BACKEND, "find_by", || {
            let collection = self.read("find_by")?;
            let key = index_key(Some(value));

            let ids: Vec<DocumentId> = match collection
                .indexes
                .iter()
                .find(|(spec, _)| spec.field == field)
            {
                Some((_, entries)) => entries.get(&key).cloned().unwrap_or_default(),
                None => collection
                    .documents
                    .iter()
                    .filter(|(_, doc)| index_key(doc.get(field)) == key)
                    .map(|(id, _)| *id)
                    .collect(),
            };

            Ok(ids
                .into_iter()
                .filter_map(|id| {
                    collection.documents.get(&id).map(|document| StoredDocument {
                        id,
                        document: document.clone(),
                    })
                })
                .collect())
        })
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        timed(BACKEND, "create_index", || {
            let mut collection = self.write("create_index")?;
            if collection.indexes.iter().any(|(s, _)| s.name == spec.name) {
                return Ok(());
            }

            let mut entries = IndexEntries::new();
            for (id, document) in &collection.documents {
                entries
                    .entry(index_key(document.get(&spec.field)))
                    .or_default()
                    .push(*id);
            }
            collection.indexes.push((spec.clone(), entries));
            Ok(())
        })
    }

    fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        let collection = self.read("list_indexes")?;
        Ok(collection.indexes.iter().map(|(s, _)| s.clone()).collect())
    }

    fn group_count(&self, fields: &[&str]) -> Result<Vec<GroupCount>> {
        if fields.is_empty() {
            return Err(Error::InvalidInput(
                "group_count needs at least one field".to_string(),
            ));
        }

        timed(BACKEND, "group_count", || {
            let collection = self.read("group_count")?;
            // key text -> (first id, count)
            let mut groups: HashMap<Vec<String>, (DocumentId, usize)> = HashMap::new();
            for (id, document) in &collection.documents {
                let key = fields.iter().map(|f| index_key(document.get(f))).collect();
                groups
                    .entry(key)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert((*id, 1));
            }

            let mut duplicates: Vec<_> = groups
                .into_values()
                .filter(|(_, count)| *count > 1)
                .collect();
            duplicates.sort_by_key(|(first, _)| *first);

            Ok(duplicates
                .into_iter()
                .map(|(first, count)| {
                    let representative = collection.documents.get(&first);
                    let key = fields
                        .iter()
                        .map(|f| {
                            representative
                                .and_then(|d| d.get(f))
                                .cloned()
                                .unwrap_or(Value::Null)
                        })
                        .collect();
                    GroupCount { key, count }
                })
                .collect())
        })
    }

    fn swap_all(&self, documents: &[Document]) -> Result<ReplaceOutcome> {
        timed(BACKEND, "swap_all", || {
            Self::check_encodable(documents)?;
            let mut collection = self.write("swap_all")?;
            let deleted = collection.clear();
            for document in documents {
                collection.insert(document.clone());
            }
            Ok(ReplaceOutcome {
                deleted,
                inserted: documents.len(),
            })
        })
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read("count")?.documents.len())
    }
}
