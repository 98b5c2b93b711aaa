//! Data-integrity checks over the collection and the export round trip.
//!
//! The store declares no uniqueness constraint; the invariants below are
//! checked here, after the fact:
//!
//! - every encounter field is present and non-empty
//! - Age is an integer, Billing Amount a float, both dates date/times
//! - no two documents share (Name, Date of Admission, Discharge Date)
//! - an export reproduces the source row count, column list and values

use crate::Result;
use crate::io::LoadedTable;
use crate::models::{Field, Value};
use crate::storage::{DocumentStore, GroupCount};
use std::fmt;
use tracing::instrument;

/// Rows compared value by value in a round-trip check.
pub const DEFAULT_COMPARE_ROWS: usize = 5;

/// A stored document lacking a field, or holding an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    /// 1-based position of the document in insertion order.
    pub row: usize,
    /// Column name.
    pub column: String,
}

/// A stored value of the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeViolation {
    /// 1-based position of the document in insertion order.
    pub row: usize,
    /// Column name.
    pub column: String,
    /// Expected value type.
    pub expected: &'static str,
    /// Value type found.
    pub found: &'static str,
}

/// Findings of [`IntegrityService::check`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrityReport {
    /// Documents inspected.
    pub document_count: usize,
    /// Absent or empty fields.
    pub missing_fields: Vec<MissingField>,
    /// Values of the wrong type.
    pub type_violations: Vec<TypeViolation>,
    /// Encounter groups holding more than one document.
    pub duplicate_groups: Vec<GroupCount>,
}

impl IntegrityReport {
    /// Returns true when no invariant is violated.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty()
            && self.type_violations.is_empty()
            && self.duplicate_groups.is_empty()
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Documents checked: {}", self.document_count)?;
        for missing in &self.missing_fields {
            writeln!(f, "  row {}: '{}' is missing or empty", missing.row, missing.column)?;
        }
        for violation in &self.type_violations {
            writeln!(
                f,
                "  row {}: '{}' should be {} but is {}",
                violation.row, violation.column, violation.expected, violation.found
            )?;
        }
        for group in &self.duplicate_groups {
            let key: Vec<String> = group.key.iter().map(Value::to_csv_field).collect();
            writeln!(
                f,
                "  duplicate encounter ({}) x{}",
                key.join(", "),
                group.count
            )?;
        }
        if self.is_clean() {
            write!(f, "No integrity violations")
        } else {
            write!(
                f,
                "{} missing field(s), {} type violation(s), {} duplicate group(s)",
                self.missing_fields.len(),
                self.type_violations.len(),
                self.duplicate_groups.len()
            )
        }
    }
}

/// A difference between a source table and its export.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTripMismatch {
    /// The tables hold a different number of rows.
    RowCount {
        /// Source rows.
        source: usize,
        /// Exported rows.
        exported: usize,
    },
    /// The column lists differ in names or order.
    Columns {
        /// Source columns.
        source: Vec<String>,
        /// Exported columns.
        exported: Vec<String>,
    },
    /// A value differs.
    Value {
        /// 1-based data row.
        row: usize,
        /// Column name.
        column: String,
        /// Source value.
        source: Value,
        /// Exported value.
        exported: Value,
    },
}

impl fmt::Display for RoundTripMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowCount { source, exported } => {
                write!(f, "row count differs: source {source}, exported {exported}")
            },
            Self::Columns { source, exported } => write!(
                f,
                "columns differ: source [{}], exported [{}]",
                source.join(", "),
                exported.join(", ")
            ),
            Self::Value {
                row,
                column,
                source,
                exported,
            } => write!(
                f,
                "row {row} '{column}' differs: source '{source}', exported '{exported}'"
            ),
        }
    }
}

/// Compares a source table with its exported counterpart.
///
/// Row count and column list are compared in full; values are compared
/// field by field, with exact equality, for the first `rows` rows.
#[must_use]
pub fn compare_tables(
    source: &LoadedTable,
    exported: &LoadedTable,
    rows: usize,
) -> Vec<RoundTripMismatch> {
    let mut mismatches = Vec::new();

    if source.row_count() != exported.row_count() {
        mismatches.push(RoundTripMismatch::RowCount {
            source: source.row_count(),
            exported: exported.row_count(),
        });
    }
    if source.columns != exported.columns {
        mismatches.push(RoundTripMismatch::Columns {
            source: source.column_names(),
            exported: exported.column_names(),
        });
    }

    for (i, (left, right)) in source
        .records
        .iter()
        .zip(&exported.records)
        .take(rows)
        .enumerate()
    {
        for &field in &source.columns {
            let (a, b) = (left.get(field), right.get(field));
            if a != b {
                mismatches.push(RoundTripMismatch::Value {
                    row: i + 1,
                    column: field.name().to_string(),
                    source: a,
                    exported: b,
                });
            }
        }
    }

    mismatches
}

/// Service running the integrity checks.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityService {
    compare_rows: usize,
}

impl Default for IntegrityService {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityService {
    /// Creates a service comparing the first five rows on round trips.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            compare_rows: DEFAULT_COMPARE_ROWS,
        }
    }

    /// Sets how many rows are compared value by value.
    #[must_use]
    pub const fn with_compare_rows(mut self, rows: usize) -> Self {
        self.compare_rows = rows;
        self
    }

    /// Inspects every stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip_all, fields(collection = store.collection()))]
    pub fn check(&self, store: &dyn DocumentStore) -> Result<IntegrityReport> {
        let documents = store.find_all()?;
        let mut report = IntegrityReport {
            document_count: documents.len(),
            ..IntegrityReport::default()
        };

        for (i, stored) in documents.iter().enumerate() {
            let row = i + 1;
            for field in Field::ALL {
                match stored.document.get(field.name()) {
                    Some(value) if !value.is_empty() => {
                        if !field.kind().matches(value) {
                            report.type_violations.push(TypeViolation {
                                row,
                                column: field.name().to_string(),
                                expected: field.kind().value_type_name(),
                                found: value.type_name(),
                            });
                        }
                    },
                    _ => report.missing_fields.push(MissingField {
                        row,
                        column: field.name().to_string(),
                    }),
                }
            }
        }

        let key = Field::encounter_key().map(Field::name);
        report.duplicate_groups = store.group_count(&key)?;

        let status = if report.is_clean() { "clean" } else { "violations" };
        metrics::counter!("integrity_checks_total", "status" => status).increment(1);
        tracing::info!(
            documents = report.document_count,
            missing_fields = report.missing_fields.len(),
            type_violations = report.type_violations.len(),
            duplicate_groups = report.duplicate_groups.len(),
            "Integrity check complete"
        );

        Ok(report)
    }

    /// Compares a source table with its export over the configured number
    /// of rows.
    #[must_use]
    pub fn compare(&self, source: &LoadedTable, exported: &LoadedTable) -> Vec<RoundTripMismatch> {
        compare_tables(source, exported, self.compare_rows)
    }
}
