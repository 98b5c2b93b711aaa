//! Integration tests for the load, store and export pipeline.
//!
//! Each test works on a scratch directory holding the source file, a
//! file-backed collection and the export.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines
)]

use healthcare_loader::config::ReplaceMode;
use healthcare_loader::io::{ExportService, ImportOptions, ImportService};
use healthcare_loader::services::{
    IntegrityService, Pipeline, PipelineConfig, RoundTripMismatch, compare_tables,
};
use healthcare_loader::storage::{IndexSpec, MemoryDocumentStore, SqliteDocumentStore};
use healthcare_loader::{DocumentStore, Error, Field, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication,Test Results";

const ROWS: &[&str] = &[
    "Bobby JacksOn,30,Male,B-,Cancer,2024-01-31,Matthew Smith,Sons and Miller,Blue Cross,18856.281305978155,328,Urgent,2024-02-02,Paracetamol,Normal",
    "LesLie TErRy,62,Male,A+,Obesity,2019-08-20,Samantha Davies,Kim Inc,Medicare,33643.327286577885,265,Emergency,2019-08-26,Ibuprofen,Inconclusive",
    "DaNnY sMitH,76,Female,A-,Obesity,2022-09-22,Tiffany Mitchell,Cook PLC,Aetna,27955.096078842456,205,Emergency,2022-10-07,Aspirin,Normal",
    "andrEw waTtS,28,Female,O+,Diabetes,2020-11-18,Kevin Wells,\"Hernandez Rogers and Vang,\",Medicare,37909.78240987528,450,Elective,2020-12-18,Ibuprofen,Abnormal",
    "adrIENNE bEll,43,Female,AB+,Cancer,2022-09-19,Kathleen Hanna,White-White,Aetna,14238.317813937623,458,Urgent,2022-10-09,Penicillin,Abnormal",
    "EMILY JOHNSOn,36,Male,A+,Asthma,2023-12-20,Taylor Newton,Nunez-Humphrey,UnitedHealthcare,48145.11095104189,389,Urgent,2023-12-24,Ibuprofen,Normal",
    "edwArD EDWaRDs,21,Female,AB-,Diabetes,2020-11-03,Kelly Olson,Group Middleton,Medicare,19580.87234486093,389,Emergency,2020-11-15,Paracetamol,Inconclusive",
];

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write_source(&self, name: &str, rows: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut contents = format!("{HEADER}\n");
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn store(&self) -> SqliteDocumentStore {
        SqliteDocumentStore::open(self.path("healthcare.db"), "patients").unwrap()
    }
}

fn load(store: &dyn DocumentStore, source: &Path) -> usize {
    ImportService::new()
        .import_into(store, source, &ImportOptions::default())
        .unwrap()
        .inserted
}

#[test]
fn test_every_field_present_and_typed_after_load() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);
    let store = ws.store();

    assert_eq!(load(&store, &source), ROWS.len());

    let documents = store.find_all().unwrap();
    assert_eq!(documents.len(), ROWS.len());
    for stored in &documents {
        for field in Field::ALL {
            let value = stored
                .document
                .get(field.name())
                .unwrap_or_else(|| panic!("missing {field}"));
            assert!(!value.is_empty(), "{field} is empty");
        }
        assert!(matches!(stored.document.get("Age"), Some(Value::Int(_))));
        assert!(matches!(
            stored.document.get("Billing Amount"),
            Some(Value::Float(_))
        ));
        assert!(matches!(
            stored.document.get("Date of Admission"),
            Some(Value::DateTime(_))
        ));
        assert!(matches!(
            stored.document.get("Discharge Date"),
            Some(Value::DateTime(_))
        ));
    }

    let report = IntegrityService::new().check(&store).unwrap();
    assert!(report.is_clean(), "{report}");
}

#[test]
fn test_round_trip_preserves_rows_columns_and_values() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);
    let export = ws.path("exported_healthcare_dataset.csv");
    let store = ws.store();

    load(&store, &source);
    let result = ExportService::new().export_to_file(&store, &export).unwrap();
    assert_eq!(result.exported, ROWS.len());

    let importer = ImportService::new();
    let source_table = importer.load_file(&source).unwrap();
    let exported_table = importer.load_file(&export).unwrap();

    assert_eq!(exported_table.row_count(), source_table.row_count());
    assert_eq!(exported_table.column_names(), source_table.column_names());
    for (left, right) in source_table
        .records
        .iter()
        .zip(&exported_table.records)
        .take(5)
    {
        assert_eq!(left, right);
    }
    assert!(compare_tables(&source_table, &exported_table, 5).is_empty());

    // Byte-level: the header line is reproduced exactly
    let text = std::fs::read_to_string(&export).unwrap();
    assert_eq!(text.lines().next(), Some(HEADER));
}

#[test]
fn test_round_trip_keeps_source_column_order() {
    let ws = Workspace::new();
    let path = ws.path("reordered.csv");
    std::fs::write(
        &path,
        "Test Results,Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication\n\
         Normal,Ada,45,Female,A+,Diabetes,2024-01-01,Dr. Lee,Mercy,Aetna,1200.5,12,Elective,2024-01-03,Aspirin\n",
    )
    .unwrap();
    let store = ws.store();
    load(&store, &path);

    let export = ws.path("out.csv");
    let result = ExportService::new().export_to_file(&store, &export).unwrap();
    assert_eq!(result.columns[0], "Test Results");
    assert_eq!(
        std::fs::read_to_string(&export).unwrap(),
        std::fs::read_to_string(&path).unwrap()
    );
}

#[test]
fn test_round_trip_keeps_full_precision_amounts() {
    let ws = Workspace::new();
    let rows: Vec<String> = ["14304.829660047977", "1200.5", "0.1", "45820.0"]
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            format!(
                "Patient {i},40,Male,O+,Asthma,2024-01-0{},Dr. Ray,Mercy,Aetna,{amount},101,Urgent,2024-02-01,Aspirin,Normal",
                i + 1
            )
        })
        .collect();
    let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let source = ws.write_source("amounts.csv", &row_refs);
    let export = ws.path("amounts_exported.csv");
    let store = ws.store();

    Pipeline::run(&store, &PipelineConfig::new(&source).with_export(&export)).unwrap();

    let stored = store.find_all().unwrap();
    assert_eq!(
        stored[0].document.get("Billing Amount"),
        Some(&Value::Float(14_304.829_660_047_977))
    );

    let importer = ImportService::new();
    let original = importer.load_file(&source).unwrap();
    let exported = importer.load_file(&export).unwrap();
    assert_eq!(exported.records, original.records);
    assert_eq!(
        std::fs::read_to_string(&export).unwrap(),
        std::fs::read_to_string(&source).unwrap()
    );
}

#[test]
fn test_replace_all_is_idempotent() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);
    let store = ws.store();

    load(&store, &source);
    let second = ImportService::new()
        .import_into(&store, &source, &ImportOptions::default())
        .unwrap();

    assert_eq!(second.deleted, ROWS.len());
    assert_eq!(second.inserted, ROWS.len());
    assert_eq!(store.count().unwrap(), ROWS.len());
    assert!(
        IntegrityService::new()
            .check(&store)
            .unwrap()
            .duplicate_groups
            .is_empty()
    );
}

#[test]
fn test_atomic_replace_is_idempotent() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);
    let store = ws.store();
    let options = ImportOptions::default().with_replace_mode(ReplaceMode::Atomic);

    for _ in 0..2 {
        ImportService::new()
            .import_into(&store, &source, &options)
            .unwrap();
    }
    assert_eq!(store.count().unwrap(), ROWS.len());
}

#[test]
fn test_three_row_scenario() {
    let ws = Workspace::new();
    let source = ws.write_source("three.csv", &ROWS[..3]);
    let export = ws.path("three_exported.csv");
    let store = ws.store();

    let outcome = Pipeline::run(&store, &PipelineConfig::new(&source).with_export(&export)).unwrap();
    assert_eq!(outcome.import.inserted, 3);
    assert_eq!(store.count().unwrap(), 3);

    let exported = ImportService::new().load_file(&export).unwrap();
    let original = ImportService::new().load_file(&source).unwrap();
    assert_eq!(exported.row_count(), 3);
    assert_eq!(exported.records, original.records);
}

#[test]
fn test_duplicate_scenario_reports_one_group() {
    let ws = Workspace::new();
    let source = ws.write_source("dupes.csv", &[ROWS[0], ROWS[1], ROWS[0]]);
    let store = ws.store();

    load(&store, &source);
    let report = IntegrityService::new().check(&store).unwrap();

    assert_eq!(report.duplicate_groups.len(), 1);
    let group = &report.duplicate_groups[0];
    assert!(group.count > 1);
    assert_eq!(group.key[0], Value::from("Bobby JacksOn"));
    assert!(!report.is_clean());
}

#[test]
fn test_reject_duplicates_keeps_previous_contents() {
    let ws = Workspace::new();
    let good = ws.write_source("good.csv", &ROWS[..2]);
    let dupes = ws.write_source("dupes.csv", &[ROWS[0], ROWS[0]]);
    let store = ws.store();
    load(&store, &good);

    let err = ImportService::new()
        .import_into(
            &store,
            &dupes,
            &ImportOptions::default().with_reject_duplicates(true),
        )
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRecords { groups: 1 }));
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_coercion_failure_aborts_before_any_write() {
    let ws = Workspace::new();
    let good = ws.write_source("good.csv", &ROWS[..2]);
    let bad_row = ROWS[2].replace(",76,", ",seventy-six,");
    let bad = ws.write_source("bad.csv", &[ROWS[3], &bad_row]);
    let store = ws.store();
    load(&store, &good);

    let err = ImportService::new()
        .import_into(&store, &bad, &ImportOptions::default())
        .unwrap_err();
    match err {
        Error::Coercion {
            row, column, value, ..
        } => {
            assert_eq!(row, 2);
            assert_eq!(column, "Age");
            assert_eq!(value, "seventy-six");
        },
        other => panic!("unexpected error: {other}"),
    }
    // The load failed before the store was touched
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_lookup_indexes_declared_non_unique() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", &[ROWS[5], ROWS[6]]);
    let store = ws.store();
    load(&store, &source);

    let indexes = store.list_indexes().unwrap();
    assert!(indexes.contains(&IndexSpec::name_index()));
    assert!(indexes.contains(&IndexSpec::admission_date_index()));
    assert!(indexes.iter().all(|spec| !spec.unique));

    // Both rows share Room Number 389 but differ by the indexed fields
    let by_name = store
        .find_by("Name", &Value::from("EMILY JOHNSOn"))
        .unwrap();
    assert_eq!(by_name.len(), 1);
}

#[test]
fn test_collection_persists_across_connections() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);

    {
        let store = ws.store();
        load(&store, &source);
        store.close().unwrap();
    }

    let reopened = ws.store();
    assert_eq!(reopened.count().unwrap(), ROWS.len());
    let report = IntegrityService::new().check(&reopened).unwrap();
    assert!(report.is_clean(), "{report}");
}

#[test]
fn test_memory_and_sqlite_backends_agree() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", ROWS);
    let sqlite = ws.store();
    let memory = MemoryDocumentStore::new("patients");

    load(&sqlite, &source);
    load(&memory, &source);

    let mut from_sqlite = Vec::new();
    let mut from_memory = Vec::new();
    ExportService::new()
        .export_to_writer(&sqlite, &mut from_sqlite)
        .unwrap();
    ExportService::new()
        .export_to_writer(&memory, &mut from_memory)
        .unwrap();
    assert_eq!(from_sqlite, from_memory);
}

#[test]
fn test_export_round_trip_mismatch_detected() {
    let ws = Workspace::new();
    let source = ws.write_source("source.csv", &ROWS[..3]);
    let other = ws.write_source("other.csv", &ROWS[1..3]);

    let importer = ImportService::new();
    let mismatches = compare_tables(
        &importer.load_file(&source).unwrap(),
        &importer.load_file(&other).unwrap(),
        5,
    );
    assert!(mismatches.contains(&RoundTripMismatch::RowCount {
        source: 3,
        exported: 2
    }));
    assert!(
        mismatches
            .iter()
            .any(|m| matches!(m, RoundTripMismatch::Value { row: 1, .. }))
    );
}

#[test]
fn test_missing_source_is_io_error() {
    let ws = Workspace::new();
    let store = ws.store();
    let err = ImportService::new()
        .import_into(&store, &ws.path("absent.csv"), &ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
