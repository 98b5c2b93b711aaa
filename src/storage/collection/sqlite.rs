//! `SQLite`-backed document collection.
//!
//! Each collection is a table of extended-JSON documents:
//!
//! ```sql
//! CREATE TABLE "<collection>" (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL)
//! ```
//!
//! Secondary indexes are expression indexes on `json_extract(body, ...)` and
//! are recorded in the `_collection_indexes` metadata table so they can be
//! listed back with their field names.

use crate::models::{Document, DocumentId, StoredDocument, Value};
use crate::storage::sqlite::{
    acquire_lock, configure_connection, json_field_expr, quote_identifier, timed,
    validate_collection_name, validate_field_name,
};
use crate::storage::traits::{DocumentStore, GroupCount, IndexSpec, ReplaceOutcome};
use crate::{Error, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite` document collection.
///
/// The connection is opened on construction and released when the store is
/// dropped or [`SqliteDocumentStore::close`] is called, so early returns on
/// any error path still close it.
pub struct SqliteDocumentStore {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
    collection: String,
    /// Quoted table name, computed once.
    table: String,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a database file and the named collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid collection name and
    /// [`Error::Connection`] if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>, collection: &str) -> Result<Self> {
        validate_collection_name(collection)?;
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::Connection {
                target: db_path.display().to_string(),
                cause: e.to_string(),
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::Connection {
            target: db_path.display().to_string(),
            cause: e.to_string(),
        })?;

        let store = Self::from_connection(conn, Some(db_path), collection);
        store.initialize()?;
        tracing::debug!(
            path = ?store.db_path,
            collection = %store.collection,
            "Opened SQLite document store"
        );
        Ok(store)
    }

    /// Creates an in-memory collection (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the collection name is invalid or the schema cannot
    /// be created.
    pub fn in_memory(collection: &str) -> Result<Self> {
        validate_collection_name(collection)?;
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection {
            target: ":memory:".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self::from_connection(conn, None, collection);
        store.initialize()?;
        Ok(store)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>, collection: &str) -> Self {
        Self {
            conn: Mutex::new(conn),
            db_path,
            collection: collection.to_string(),
            table: quote_identifier(collection),
        }
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Closes the connection, reporting any error `SQLite` raises while
    /// finalizing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the connection cannot be closed
    /// cleanly.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.close().map_err(|(_, e)| Error::OperationFailed {
            operation: "close_connection".to_string(),
            cause: e.to_string(),
        })?;
        tracing::debug!(collection = %self.collection, "Closed SQLite document store");
        Ok(())
    }

    /// Creates the collection table and the index metadata table.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS _collection_indexes (
                collection TEXT NOT NULL,
                name TEXT NOT NULL,
                field TEXT NOT NULL,
                is_unique INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (collection, name)
            );
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL
            );",
            self.table
        ))
        .map_err(|e| Error::Connection {
            target: self.describe(),
            cause: format!("schema initialization failed: {e}"),
        })
    }

    fn describe(&self) -> String {
        self.db_path.as_ref().map_or_else(
            || format!(":memory:/{}", self.collection),
            |p| format!("{}/{}", p.display(), self.collection),
        )
    }

    /// Encodes a batch up front so an encoding failure never leaves a
    /// partial insert behind.
    fn encode_all(documents: &[Document]) -> Result<Vec<String>> {
        documents.iter().map(Document::to_json_string).collect()
    }

    fn insert_encoded(&self, conn: &Connection, bodies: &[String]) -> Result<usize> {
        let mut stmt = conn
            .prepare_cached(&format!("INSERT INTO {} (body) VALUES (?1)", self.table))
            .map_err(|e| failed("prepare_insert", &e))?;
        for body in bodies {
            stmt.execute(params![body])
                .map_err(|e| failed("insert_document", &e))?;
        }
        Ok(bodies.len())
    }

    fn fetch_body(&self, conn: &Connection, id: i64) -> Result<Document> {
        let body: String = conn
            .query_row(
                &format!("SELECT body FROM {} WHERE id = ?1", self.table),
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| failed("fetch_document", &e))?;
        Document::from_json_str(&body)
    }

    fn query_documents(
        &self,
        conn: &Connection,
        sql: &str,
        param: Option<SqlValue>,
    ) -> Result<Vec<StoredDocument>> {
        let mut stmt = conn.prepare(sql).map_err(|e| failed("prepare_find", &e))?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let rows = match &param {
            Some(value) => stmt.query_map([value], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| failed("find_documents", &e))?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(|e| failed("read_document_row", &e))?;
            documents.push(StoredDocument {
                id: DocumentId::new(id),
                document: Document::from_json_str(&body)?,
            });
        }
        Ok(documents)
    }
}

/// Builds the `OperationFailed` error for a failed `SQLite` call.
fn failed(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// Converts a lookup value into the SQL value `json_extract` yields for it.
///
/// Tagged dates come back from `json_extract` as minified JSON text.
fn lookup_param(value: &Value) -> Result<Option<SqlValue>> {
    Ok(match value {
        Value::Null => None,
        Value::Text(s) => Some(SqlValue::Text(s.clone())),
        Value::Int(i) => Some(SqlValue::Integer(*i)),
        Value::Float(f) => Some(SqlValue::Real(*f)),
        Value::DateTime(_) => {
            let json = value.to_json()?;
            Some(SqlValue::Text(json.to_string()))
        },
    })
}

impl DocumentStore for SqliteDocumentStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    #[instrument(skip(self), fields(backend = "sqlite", collection = %self.collection))]
    fn delete_all(&self) -> Result<usize> {
        timed(BACKEND, "delete_all", || {
            let conn = acquire_lock(&self.conn);
            conn.execute(&format!("DELETE FROM {}", self.table), [])
                .map_err(|e| failed("delete_all", &e))
        })
    }

    #[instrument(skip(self, documents), fields(backend = "sqlite", collection = %self.collection, count = documents.len()))]
    fn insert_many(&self, documents: &[Document]) -> Result<usize> {
        timed(BACKEND, "insert_many", || {
            let bodies = Self::encode_all(documents)?;
            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction()
                .map_err(|e| failed("begin_transaction", &e))?;
            let inserted = self.insert_encoded(&tx, &bodies)?;
            tx.commit().map_err(|e| failed("commit_transaction", &e))?;
            Ok(inserted)
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", collection = %self.collection))]
    fn find_all(&self) -> Result<Vec<StoredDocument>> {
        timed(BACKEND, "find_all", || {
            let conn = acquire_lock(&self.conn);
            self.query_documents(
                &conn,
                &format!("SELECT id, body FROM {} ORDER BY id", self.table),
                None,
            )
        })
    }

    #[instrument(skip(self, value), fields(backend = "sqlite", collection = %self.collection))]
    fn find_by(&self, field: &str, value: &Value) -> Result<Vec<StoredDocument>> {
        validate_field_name(field)?;
        timed(BACKEND, "find_by", || {
            let expr = json_field_expr(field);
            let param = lookup_param(value)?;
            let sql = if param.is_some() {
                format!(
                    "SELECT id, body FROM {} WHERE {expr} = ?1 ORDER BY id",
                    self.table
                )
            } else {
                format!(
                    "SELECT id, body FROM {} WHERE {expr} IS NULL ORDER BY id",
                    self.table
                )
            };
            let conn = acquire_lock(&self.conn);
            self.query_documents(&conn, &sql, param)
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", collection = %self.collection, index = %spec.name))]
    fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        validate_field_name(&spec.field)?;
        validate_field_name(&spec.name)?;
        timed(BACKEND, "create_index", || {
            let index_name = quote_identifier(&format!("{}__{}", self.collection, spec.name));
            let unique = if spec.unique { "UNIQUE " } else { "" };
            let conn = acquire_lock(&self.conn);
            conn.execute(
                &format!(
                    "CREATE {unique}INDEX IF NOT EXISTS {index_name} ON {}({})",
                    self.table,
                    json_field_expr(&spec.field)
                ),
                [],
            )
            .map_err(|e| failed("create_index", &e))?;
            conn.execute(
                "INSERT OR IGNORE INTO _collection_indexes (collection, name, field, is_unique)
                 VALUES (?1, ?2, ?3, ?4)",
                params![self.collection, spec.name, spec.field, spec.unique],
            )
            .map_err(|e| failed("record_index", &e))?;
            Ok(())
        })
    }

    fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        timed(BACKEND, "list_indexes", || {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(
                    "SELECT name, field, is_unique FROM _collection_indexes
                     WHERE collection = ?1 ORDER BY rowid",
                )
                .map_err(|e| failed("prepare_list_indexes", &e))?;
            let rows = stmt
                .query_map(params![self.collection], |row| {
                    Ok(IndexSpec {
                        name: row.get(0)?,
                        field: row.get(1)?,
                        unique: row.get(2)?,
                    })
                })
                .map_err(|e| failed("list_indexes", &e))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| failed("read_index_row", &e))
        })
    }

    #[instrument(skip(self), fields(backend = "sqlite", collection = %self.collection))]
    fn group_count(&self, fields: &[&str]) -> Result<Vec<GroupCount>> {
        if fields.is_empty() {
            return Err(Error::InvalidInput(
                "group_count needs at least one field".to_string(),
            ));
        }
        for field in fields {
            validate_field_name(field)?;
        }

        timed(BACKEND, "group_count", || {
            let group_by = fields
                .iter()
                .map(|f| json_field_expr(f))
                .collect::<Vec<_>>()
                .join(", ");
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT MIN(id), COUNT(*) FROM {} GROUP BY {group_by}
                     HAVING COUNT(*) > 1 ORDER BY MIN(id)",
                    self.table
                ))
                .map_err(|e| failed("prepare_group_count", &e))?;
            let groups = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
                .map_err(|e| failed("group_count", &e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| failed("read_group_row", &e))?;

            let mut counts = Vec::with_capacity(groups.len());
            for (first_id, count) in groups {
                let representative = self.fetch_body(&conn, first_id)?;
                let key = fields
                    .iter()
                    .map(|f| representative.get(f).cloned().unwrap_or(Value::Null))
                    .collect();
                counts.push(GroupCount {
                    key,
                    count: usize::try_from(count).unwrap_or(usize::MAX),
                });
            }
            Ok(counts)
        })
    }

    #[instrument(skip(self, documents), fields(backend = "sqlite", collection = %self.collection, count = documents.len()))]
    fn swap_all(&self, documents: &[Document]) -> Result<ReplaceOutcome> {
        timed(BACKEND, "swap_all", || {
            let bodies = Self::encode_all(documents)?;
            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction()
                .map_err(|e| failed("begin_transaction", &e))?;
            let deleted = tx
                .execute(&format!("DELETE FROM {}", self.table), [])
                .map_err(|e| failed("delete_all", &e))?;
            let inserted = self.insert_encoded(&tx, &bodies)?;
            tx.commit().map_err(|e| failed("commit_transaction", &e))?;
            Ok(ReplaceOutcome { deleted, inserted })
        })
    }

    fn count(&self) -> Result<usize> {
        timed(BACKEND, "count", || {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                    row.get(0)
                })
                .map_err(|e| failed("count", &e))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}
