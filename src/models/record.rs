//! Patient encounter records.

use super::{Document, Value};
use crate::{Error, Result};
use chrono::NaiveDateTime;
use std::fmt;

/// One of the fifteen columns of a patient encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Patient name.
    Name,
    /// Age in whole years.
    Age,
    /// Gender.
    Gender,
    /// Blood type.
    BloodType,
    /// Medical condition.
    MedicalCondition,
    /// Date of admission.
    DateOfAdmission,
    /// Attending doctor.
    Doctor,
    /// Hospital.
    Hospital,
    /// Insurance provider.
    InsuranceProvider,
    /// Billing amount.
    BillingAmount,
    /// Room number.
    RoomNumber,
    /// Admission type.
    AdmissionType,
    /// Discharge date.
    DischargeDate,
    /// Medication.
    Medication,
    /// Test results.
    TestResults,
}

/// Semantic type of a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Whole number.
    Integer,
    /// Floating point number.
    Float,
    /// Date/time.
    DateTime,
}

impl FieldKind {
    /// Returns the matching [`Value::type_name`].
    #[must_use]
    pub const fn value_type_name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "int",
            Self::Float => "float",
            Self::DateTime => "datetime",
        }
    }

    /// Returns whether a value carries this kind.
    #[must_use]
    pub const fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Text, Value::Text(_))
                | (Self::Integer, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::DateTime, Value::DateTime(_))
        )
    }
}

impl Field {
    /// All columns in their canonical order.
    pub const ALL: [Self; 15] = [
        Self::Name,
        Self::Age,
        Self::Gender,
        Self::BloodType,
        Self::MedicalCondition,
        Self::DateOfAdmission,
        Self::Doctor,
        Self::Hospital,
        Self::InsuranceProvider,
        Self::BillingAmount,
        Self::RoomNumber,
        Self::AdmissionType,
        Self::DischargeDate,
        Self::Medication,
        Self::TestResults,
    ];

    /// Returns the exact header text.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Age => "Age",
            Self::Gender => "Gender",
            Self::BloodType => "Blood Type",
            Self::MedicalCondition => "Medical Condition",
            Self::DateOfAdmission => "Date of Admission",
            Self::Doctor => "Doctor",
            Self::Hospital => "Hospital",
            Self::InsuranceProvider => "Insurance Provider",
            Self::BillingAmount => "Billing Amount",
            Self::RoomNumber => "Room Number",
            Self::AdmissionType => "Admission Type",
            Self::DischargeDate => "Discharge Date",
            Self::Medication => "Medication",
            Self::TestResults => "Test Results",
        }
    }

    /// Parses a header.
    ///
    /// Returns `None` if the header is not one of the fifteen columns.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        Self::ALL.into_iter().find(|f| f.name() == header)
    }

    /// Returns the semantic type of the column.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Age => FieldKind::Integer,
            Self::BillingAmount => FieldKind::Float,
            Self::DateOfAdmission | Self::DischargeDate => FieldKind::DateTime,
            _ => FieldKind::Text,
        }
    }

    /// The columns that identify a unique encounter.
    #[must_use]
    pub const fn encounter_key() -> [Self; 3] {
        [Self::Name, Self::DateOfAdmission, Self::DischargeDate]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A patient encounter with all fields coerced to their semantic types.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Patient name.
    pub name: String,
    /// Age in whole years.
    pub age: i64,
    /// Gender.
    pub gender: String,
    /// Blood type.
    pub blood_type: String,
    /// Medical condition.
    pub medical_condition: String,
    /// Date of admission.
    pub date_of_admission: NaiveDateTime,
    /// Attending doctor.
    pub doctor: String,
    /// Hospital.
    pub hospital: String,
    /// Insurance provider.
    pub insurance_provider: String,
    /// Billing amount.
    pub billing_amount: f64,
    /// Room number, kept verbatim.
    pub room_number: String,
    /// Admission type.
    pub admission_type: String,
    /// Discharge date.
    pub discharge_date: NaiveDateTime,
    /// Medication.
    pub medication: String,
    /// Test results.
    pub test_results: String,
}

/// The (Name, Date of Admission, Discharge Date) identity of an encounter.
pub type EncounterKey = (String, NaiveDateTime, NaiveDateTime);

impl Record {
    /// Returns the typed value of a column.
    #[must_use]
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Name => Value::Text(self.name.clone()),
            Field::Age => Value::Int(self.age),
            Field::Gender => Value::Text(self.gender.clone()),
            Field::BloodType => Value::Text(self.blood_type.clone()),
            Field::MedicalCondition => Value::Text(self.medical_condition.clone()),
            Field::DateOfAdmission => Value::DateTime(self.date_of_admission),
            Field::Doctor => Value::Text(self.doctor.clone()),
            Field::Hospital => Value::Text(self.hospital.clone()),
            Field::InsuranceProvider => Value::Text(self.insurance_provider.clone()),
            Field::BillingAmount => Value::Float(self.billing_amount),
            Field::RoomNumber => Value::Text(self.room_number.clone()),
            Field::AdmissionType => Value::Text(self.admission_type.clone()),
            Field::DischargeDate => Value::DateTime(self.discharge_date),
            Field::Medication => Value::Text(self.medication.clone()),
            Field::TestResults => Value::Text(self.test_results.clone()),
        }
    }

    /// Returns the encounter identity used for duplicate detection.
    #[must_use]
    pub fn encounter_key(&self) -> EncounterKey {
        (
            self.name.clone(),
            self.date_of_admission,
            self.discharge_date,
        )
    }

    /// Builds a document whose keys follow `columns`.
    #[must_use]
    pub fn to_document(&self, columns: &[Field]) -> Document {
        let mut document = Document::new();
        for &field in columns {
            document.insert(field.name(), self.get(field));
        }
        document
    }

    /// Rebuilds a record from a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a field is missing or carries the
    /// wrong value type.
    pub fn from_document(document: &Document) -> Result<Self> {
        let text = |field: Field| -> Result<String> {
            match lookup(document, field)? {
                Value::Text(s) => Ok(s.clone()),
                other => Err(type_mismatch(field, other)),
            }
        };
        let datetime = |field: Field| -> Result<NaiveDateTime> {
            match lookup(document, field)? {
                Value::DateTime(dt) => Ok(*dt),
                other => Err(type_mismatch(field, other)),
            }
        };

        let age = match lookup(document, Field::Age)? {
            Value::Int(i) => *i,
            other => return Err(type_mismatch(Field::Age, other)),
        };
        let billing_amount = match lookup(document, Field::BillingAmount)? {
            Value::Float(f) => *f,
            other => return Err(type_mismatch(Field::BillingAmount, other)),
        };

        Ok(Self {
            name: text(Field::Name)?,
            age,
            gender: text(Field::Gender)?,
            blood_type: text(Field::BloodType)?,
            medical_condition: text(Field::MedicalCondition)?,
            date_of_admission: datetime(Field::DateOfAdmission)?,
            doctor: text(Field::Doctor)?,
            hospital: text(Field::Hospital)?,
            insurance_provider: text(Field::InsuranceProvider)?,
            billing_amount,
            room_number: text(Field::RoomNumber)?,
            admission_type: text(Field::AdmissionType)?,
            discharge_date: datetime(Field::DischargeDate)?,
            medication: text(Field::Medication)?,
            test_results: text(Field::TestResults)?,
        })
    }
}

fn lookup(document: &Document, field: Field) -> Result<&Value> {
    document
        .get(field.name())
        .ok_or_else(|| Error::InvalidInput(format!("document is missing '{field}'")))
}

fn type_mismatch(field: Field, found: &Value) -> Error {
    Error::InvalidInput(format!(
        "'{field}' should be {} but is {}",
        field.kind().value_type_name(),
        found.type_name()
    ))
}
