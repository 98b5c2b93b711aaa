//! Shared `SQLite` infrastructure for the document collection.
//!
//! - [`connection`]: lock acquisition and pragma configuration
//! - [`sql`]: identifier validation, quoting and JSON path expressions
//! - [`metrics`]: storage operation metrics, also used by the memory backend

mod connection;
mod metrics;
mod sql;

pub use connection::{BUSY_TIMEOUT_MS, acquire_lock, configure_connection};
pub use metrics::{OperationStatus, record_operation_metrics, timed};
pub use sql::{json_field_expr, quote_identifier, validate_collection_name, validate_field_name};
