//! SQL helper functions for the `SQLite` document collection.
//!
//! Collection names, index names and field paths end up inside SQL text
//! (table names and expression indexes cannot be bound as parameters), so
//! every one of them passes through a validator or quoting helper here.

use crate::{Error, Result};

/// Maximum length of a collection name.
const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Validates a collection name.
///
/// Names must start with an ASCII letter or underscore, continue with ASCII
/// alphanumerics or underscores, and must not use the reserved `sqlite_` or
/// `_collection` prefixes.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the name is not a plain identifier.
///
/// # Examples
///
/// ```
/// use healthcare_loader::storage::sqlite::validate_collection_name;
///
/// assert!(validate_collection_name("patients").is_ok());
/// assert!(validate_collection_name("test_patients").is_ok());
/// assert!(validate_collection_name("drop table").is_err());
/// ```
pub fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    let lower = name.to_ascii_lowercase();
    let reserved = lower.starts_with("sqlite_") || lower.starts_with("_collection");

    if !valid_start || !valid_rest || reserved || name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "invalid collection name '{name}': use letters, digits and underscores"
        )));
    }
    Ok(())
}

/// Validates a field name used in a JSON path.
///
/// Column headers may contain spaces but not quotes or control characters.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty names or names containing quotes.
pub fn validate_field_name(field: &str) -> Result<()> {
    if field.is_empty() || field.chars().any(|c| c == '"' || c == '\'' || c.is_control()) {
        return Err(Error::InvalidInput(format!("invalid field name '{field}'")));
    }
    Ok(())
}

/// Quotes an identifier for use in SQL text.
///
/// # Examples
///
/// ```
/// use healthcare_loader::storage::sqlite::quote_identifier;
///
/// assert_eq!(quote_identifier("patients"), "\"patients\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the `json_extract` expression selecting a top-level field.
///
/// The field must already have passed [`validate_field_name`]. The same text
/// is used for index declarations and lookups so `SQLite` can match the
/// expression index.
#[must_use]
pub fn json_field_expr(field: &str) -> String {
    format!("json_extract(body, '$.\"{field}\"')")
}
