//! Storage backend traits.

mod document;

pub use document::{DocumentStore, GroupCount, IndexSpec, ReplaceOutcome};
