//! Field coercion at the loader boundary.
//!
//! Every raw value read from the source passes through here before a
//! [`Record`] exists. A value that cannot be coerced fails the whole load;
//! rows are never skipped.

use crate::models::{Field, Record};
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Date/time layouts accepted for date columns.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

fn coercion_error(row: usize, field: Field, raw: &str, expected: &str) -> Error {
    Error::Coercion {
        row,
        column: field.name().to_string(),
        value: raw.to_string(),
        expected: expected.to_string(),
    }
}

/// Requires a non-blank text value.
///
/// # Errors
///
/// Returns [`Error::Coercion`] if the value is blank.
pub fn require_text(raw: &str, row: usize, field: Field) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(coercion_error(row, field, raw, "non-empty text"));
    }
    Ok(trimmed.to_string())
}

/// Coerces `Age` to an integer.
///
/// # Errors
///
/// Returns [`Error::Coercion`] unless the value is a base-10 integer.
pub fn coerce_age(raw: &str, row: usize) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| coercion_error(row, Field::Age, raw, "integer"))
}

/// Coerces `Billing Amount` to a finite float.
///
/// # Errors
///
/// Returns [`Error::Coercion`] for non-numeric and non-finite values.
pub fn coerce_billing_amount(raw: &str, row: usize) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| coercion_error(row, Field::BillingAmount, raw, "float"))
}

/// Parses a date or date/time, returning `None` when no layout matches.
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

/// Coerces a date column to a date/time.
///
/// # Errors
///
/// Returns [`Error::Coercion`] if the value matches no accepted layout.
pub fn coerce_datetime(raw: &str, row: usize, field: Field) -> Result<NaiveDateTime> {
    parse_datetime(raw).ok_or_else(|| coercion_error(row, field, raw, "date"))
}

/// Builds a typed record from the raw values of one row.
///
/// `raw` returns the value of each column as read from the file.
///
/// # Errors
///
/// Returns the first coercion failure in column order.
pub fn build_record<'a>(row: usize, raw: impl Fn(Field) -> &'a str) -> Result<Record> {
    let text = |field: Field| require_text(raw(field), row, field);
    let date = |field: Field| coerce_datetime(raw(field), row, field);

    Ok(Record {
        name: text(Field::Name)?,
        age: coerce_age(raw(Field::Age), row)?,
        gender: text(Field::Gender)?,
        blood_type: text(Field::BloodType)?,
        medical_condition: text(Field::MedicalCondition)?,
        date_of_admission: date(Field::DateOfAdmission)?,
        doctor: text(Field::Doctor)?,
        hospital: text(Field::Hospital)?,
        insurance_provider: text(Field::InsuranceProvider)?,
        billing_amount: coerce_billing_amount(raw(Field::BillingAmount), row)?,
        room_number: text(Field::RoomNumber)?,
        admission_type: text(Field::AdmissionType)?,
        discharge_date: date(Field::DischargeDate)?,
        medication: text(Field::Medication)?,
        test_results: text(Field::TestResults)?,
    })
}
