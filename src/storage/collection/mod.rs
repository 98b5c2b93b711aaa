//! Document collection implementations.

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
