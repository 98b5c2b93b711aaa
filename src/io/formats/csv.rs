//! CSV format adapter for import/export.
//!
//! The header row must name each of the fifteen encounter columns exactly
//! once, in any order. That order becomes the column layout of the load and
//! is reproduced on export.

use crate::io::traits::{ExportSink, ImportSource};
use crate::io::validation::build_record;
use crate::models::{Document, Field, Record};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// CSV import source.
///
/// Reads delimited files whose first row is the header.
pub struct CsvImportSource<R: Read> {
    /// CSV reader.
    reader: csv::Reader<R>,
    /// Column layout in source order.
    columns: Vec<Field>,
    /// Position of each field within a row.
    positions: BTreeMap<Field, usize>,
    /// 1-based number of the last data row read.
    row: usize,
}

/// Maps header names to fields, rejecting unknown, repeated and missing
/// columns.
fn map_headers(headers: &csv::StringRecord) -> Result<(Vec<Field>, BTreeMap<Field, usize>)> {
    let mut columns = Vec::with_capacity(headers.len());
    let mut positions = BTreeMap::new();

    for (i, header) in headers.iter().enumerate() {
        let field = Field::parse(header)
            .ok_or_else(|| Error::InvalidInput(format!("unknown column '{header}'")))?;
        if positions.insert(field, i).is_some() {
            return Err(Error::InvalidInput(format!(
                "column '{field}' appears more than once"
            )));
        }
        columns.push(field);
    }

    let missing: Vec<&str> = Field::ALL
        .iter()
        .filter(|f| !positions.contains_key(f))
        .map(|f| f.name())
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "missing column(s): {}",
            missing.join(", ")
        )));
    }

    Ok((columns, positions))
}

/// Converts a csv error, keeping I/O failures apart from malformed content.
fn read_error(row: usize, e: &csv::Error) -> Error {
    if e.is_io_error() {
        Error::OperationFailed {
            operation: "read_csv".to_string(),
            cause: e.to_string(),
        }
    } else {
        Error::Parse {
            row,
            cause: e.to_string(),
        }
    }
}

impl<R: Read> CsvImportSource<R> {
    /// Creates a new CSV import source with `,` as delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error if headers cannot be read or do not name the
    /// encounter columns exactly once each.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_delimiter(reader, b',')
    }

    /// Creates a new CSV import source with a custom delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error if headers cannot be read or do not name the
    /// encounter columns exactly once each.
    pub fn with_delimiter(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers().map_err(|e| read_error(0, &e))?.clone();
        let (columns, positions) = map_headers(&headers)?;

        Ok(Self {
            reader: csv_reader,
            columns,
            positions,
            row: 0,
        })
    }

    /// Parses a row into a typed record.
    fn parse_record(&self, record: &csv::StringRecord) -> Result<Record> {
        build_record(self.row, |field| {
            self.positions
                .get(&field)
                .and_then(|&i| record.get(i))
                .unwrap_or("")
        })
    }
}

impl<R: Read> ImportSource for CsvImportSource<R> {
    fn columns(&self) -> &[Field] {
        &self.columns
    }

    fn next(&mut self) -> Result<Option<Record>> {
        let mut record = csv::StringRecord::new();

        let has_record = self
            .reader
            .read_record(&mut record)
            .map_err(|e| read_error(self.row + 1, &e))?;
        if !has_record {
            return Ok(None);
        }

        self.row += 1;
        self.parse_record(&record).map(Some)
    }
}

/// CSV export sink.
///
/// Writes documents as rows under a header of the given columns. A field a
/// document lacks is written as an empty value.
pub struct CsvExportSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
    /// Whether headers have been written.
    headers_written: bool,
}

impl<W: Write> CsvExportSink<W> {
    /// Creates a new CSV export sink with `,` as delimiter.
    #[must_use]
    pub fn new(writer: W, columns: Vec<String>) -> Self {
        Self::with_delimiter(writer, columns, b',')
    }

    /// Creates a new CSV export sink with a custom delimiter.
    #[must_use]
    pub fn with_delimiter(writer: W, columns: Vec<String>, delimiter: u8) -> Self {
        let csv_writer = csv::WriterBuilder::new()
            .has_headers(false) // We write headers manually
            .delimiter(delimiter)
            .from_writer(writer);

        Self {
            writer: csv_writer,
            columns,
            headers_written: false,
        }
    }

    /// Writes headers if not already written.
    fn ensure_headers(&mut self) -> Result<()> {
        if !self.headers_written && !self.columns.is_empty() {
            self.writer
                .write_record(&self.columns)
                .map_err(|e| Error::OperationFailed {
                    operation: "write_csv_headers".to_string(),
                    cause: e.to_string(),
                })?;
            self.headers_written = true;
        }
        Ok(())
    }
}

impl<W: Write> ExportSink for CsvExportSink<W> {
    fn write(&mut self, document: &Document) -> Result<()> {
        self.ensure_headers()?;

        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                document
                    .get(column)
                    .map(crate::models::Value::to_csv_field)
                    .unwrap_or_default()
            })
            .collect();

        self.writer
            .write_record(&row)
            .map_err(|e| Error::OperationFailed {
                operation: "write_csv".to_string(),
                cause: e.to_string(),
            })
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.ensure_headers()?;
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_csv".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::models::Value;
    use crate::models::fixtures::{date, record};
    use std::io::Cursor;

    const HEADER: &str = "Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication,Test Results";

    fn source(body: &str) -> Result<CsvImportSource<Cursor<String>>> {
        CsvImportSource::new(Cursor::new(format!("{HEADER}\n{body}")))
    }

    #[test]
    fn test_import_basic_csv() {
        let mut source = source(
            "Bobby JacksOn,30,Male,B-,Cancer,2024-01-31,Matthew Smith,Sons and Miller,Blue Cross,18856.281305978155,328,Urgent,2024-02-02,Paracetamol,Normal\n\
             LesLie TErRy,62,Male,A+,Obesity,2019-08-20,Samantha Davies,Kim Inc,Medicare,33643.327286577885,265,Emergency,2019-08-26,Ibuprofen,Inconclusive\n",
        )
        .unwrap();

        assert_eq!(source.columns(), &Field::ALL);

        let first = source.next().unwrap().unwrap();
        assert_eq!(first.name, "Bobby JacksOn");
        assert_eq!(first.age, 30);
        assert_eq!(first.date_of_admission, date(2024, 1, 31));

        let second = source.next().unwrap().unwrap();
        assert_eq!(second.name, "LesLie TErRy");
        assert_eq!(second.room_number, "265");

        assert!(source.next().unwrap().is_none());
    }

    #[test]
    fn test_import_reordered_headers() {
        let input = "Test Results,Medication,Discharge Date,Admission Type,Room Number,Billing Amount,Insurance Provider,Hospital,Doctor,Date of Admission,Medical Condition,Blood Type,Gender,Age,Name\n\
                     Normal,Aspirin,2020-01-05,Elective,101,250.5,Aetna,General,Dr. Who,2020-01-01,Asthma,O+,Female,40,Ada\n";
        let mut source = CsvImportSource::new(Cursor::new(input)).unwrap();

        assert_eq!(source.columns()[0], Field::TestResults);
        assert_eq!(source.columns()[14], Field::Name);

        let record = source.next().unwrap().unwrap();
        assert_eq!(record.name, "Ada");
        assert_eq!(record.age, 40);
        assert!((record.billing_amount - 250.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_import_semicolon_delimiter() {
        let input = format!(
            "{}\nAda;40;Female;O+;Asthma;2020-01-01;Dr. Who;General;Aetna;250.5;101;Elective;2020-01-05;Aspirin;Normal\n",
            HEADER.replace(',', ";")
        );
        let mut source = CsvImportSource::with_delimiter(Cursor::new(input), b';').unwrap();
        assert_eq!(source.next().unwrap().unwrap().name, "Ada");
    }

    #[test]
    fn test_import_missing_column() {
        let input = "Name,Age\nAda,40\n";
        let err = CsvImportSource::new(Cursor::new(input)).err().unwrap();
        assert!(err.to_string().contains("missing column(s): Gender"));
    }

    #[test]
    fn test_import_unknown_and_repeated_columns() {
        let unknown = format!("{HEADER},Notes\n");
        let err = CsvImportSource::new(Cursor::new(unknown)).err().unwrap();
        assert!(err.to_string().contains("unknown column 'Notes'"));

        let repeated = format!("{HEADER},Age\n");
        let err = CsvImportSource::new(Cursor::new(repeated)).err().unwrap();
        assert!(err.to_string().contains("'Age' appears more than once"));
    }

    #[test]
    fn test_import_coercion_failure_names_row() {
        let mut source = source(
            "Ada,40,Female,O+,Asthma,2020-01-01,Dr. Who,General,Aetna,250.5,101,Elective,2020-01-05,Aspirin,Normal\n\
             Bob,forty,Male,O+,Asthma,2020-01-01,Dr. Who,General,Aetna,250.5,101,Elective,2020-01-05,Aspirin,Normal\n",
        )
        .unwrap();

        assert!(source.next().unwrap().is_some());
        let err = source.next().unwrap_err();
        assert!(matches!(err, Error::Coercion { row: 2, .. }));
    }

    #[test]
    fn test_import_ragged_row_is_parse_error() {
        let mut source = source("Ada,40,Female\n").unwrap();
        let err = source.next().unwrap_err();
        assert!(matches!(err, Error::Parse { row: 1, .. }));
    }

    #[test]
    fn test_export_csv() {
        let columns: Vec<String> = Field::ALL.iter().map(|f| f.name().to_string()).collect();
        let document = record("Ada", date(2020, 1, 1), date(2020, 1, 5)).to_document(&Field::ALL);

        let mut output = Vec::new();
        {
            let mut sink = CsvExportSink::new(&mut output, columns);
            sink.write(&document).unwrap();
            Box::new(sink).finalize().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        let mut lines = output_str.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(
            lines.next(),
            Some(
                "Ada,30,Male,B-,Cancer,2020-01-01,Matthew Smith,Sons and Miller,Blue Cross,18856.28,328,Urgent,2020-01-05,Paracetamol,Normal"
            )
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_missing_field_is_empty() {
        let mut output = Vec::new();
        {
            let mut sink =
                CsvExportSink::new(&mut output, vec!["Name".to_string(), "Age".to_string()]);
            sink.write(&Document::new().with("Name", "Ada")).unwrap();
            sink.write(&Document::new().with("Age", Value::Int(3))).unwrap();
            Box::new(sink).finalize().unwrap();
        }
        assert_eq!(String::from_utf8(output).unwrap(), "Name,Age\nAda,\n,3\n");
    }

    #[test]
    fn test_export_quotes_embedded_delimiters() {
        let mut output = Vec::new();
        {
            let mut sink = CsvExportSink::new(&mut output, vec!["Hospital".to_string()]);
            sink.write(&Document::new().with("Hospital", "Smith, Jones and Sons"))
                .unwrap();
            Box::new(sink).finalize().unwrap();
        }
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Hospital\n\"Smith, Jones and Sons\"\n"
        );
    }
}
