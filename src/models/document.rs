//! Typed document values and documents.
//!
//! Documents are stored as extended JSON: integers and floats keep their
//! numeric kind and date/time values are tagged as `{"$date": "..."}` so that
//! reading a document back restores the same [`Value`] variant.

use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde_json::{Map, Number};
use std::fmt;

/// Key used to tag date/time values in the JSON encoding.
pub const DATE_TAG: &str = "$date";

/// Format of a tagged date/time in the JSON encoding.
const JSON_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A typed document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Free text.
    Text(String),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A date/time without time zone.
    DateTime(NaiveDateTime),
    /// An absent value.
    Null,
}

impl Value {
    /// Returns the type name used in reports and error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::DateTime(_) => "datetime",
            Self::Null => "null",
        }
    }

    /// Returns true for `Null` and for blank text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Int(_) | Self::Float(_) | Self::DateTime(_) => false,
        }
    }

    /// Serialises the value as a delimited-file field.
    ///
    /// Dates at midnight render as `YYYY-MM-DD`, other date/times as
    /// `YYYY-MM-DD HH:MM:SS`. Floats always carry a decimal point.
    #[must_use]
    pub fn to_csv_field(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::DateTime(dt) => format_datetime(dt),
            Self::Null => String::new(),
        }
    }

    /// Encodes the value as extended JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for non-finite floats, which JSON
    /// cannot represent.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::Number(Number::from(*i)),
            Self::Float(f) => serde_json::Value::Number(Number::from_f64(*f).ok_or_else(|| {
                Error::InvalidInput(format!("non-finite float {f} cannot be stored"))
            })?),
            Self::DateTime(dt) => {
                let mut tagged = Map::new();
                tagged.insert(
                    DATE_TAG.to_string(),
                    serde_json::Value::String(dt.format(JSON_DATETIME_FORMAT).to_string()),
                );
                serde_json::Value::Object(tagged)
            },
            Self::Null => serde_json::Value::Null,
        })
    }

    /// Decodes a value from extended JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for booleans, arrays, untagged objects
    /// and malformed dates.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| Error::InvalidInput(format!("unsupported number {n}")))
                }
            },
            serde_json::Value::Object(map) => {
                let raw = match (map.len(), map.get(DATE_TAG)) {
                    (1, Some(serde_json::Value::String(raw))) => raw,
                    _ => {
                        return Err(Error::InvalidInput(
                            "nested objects are not supported".to_string(),
                        ));
                    },
                };
                NaiveDateTime::parse_from_str(raw, JSON_DATETIME_FORMAT)
                    .map(Self::DateTime)
                    .map_err(|e| Error::InvalidInput(format!("invalid $date '{raw}': {e}")))
            },
            serde_json::Value::Bool(_) | serde_json::Value::Array(_) => Err(Error::InvalidInput(
                format!("unsupported value type: {json}"),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_csv_field())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

/// Formats a float with the shortest representation that round-trips,
/// keeping a decimal point on integral values.
fn format_float(f: f64) -> String {
    let s = f.to_string();
    if f.is_finite() && !s.contains(['.', 'e', 'E']) {
        format!("{s}.0")
    } else {
        s
    }
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

/// An insertion-ordered document.
///
/// Key order is preserved through storage so exports keep the column order
/// of the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Sets a field, keeping the original position when the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Builder-style [`Document::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns whether the document has a field.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encodes the document as an extended-JSON object string.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be encoded.
    pub fn to_json_string(&self) -> Result<String> {
        let mut map = Map::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.to_json()?);
        }
        serde_json::to_string(&serde_json::Value::Object(map)).map_err(|e| {
            Error::OperationFailed {
                operation: "encode_document".to_string(),
                cause: e.to_string(),
            }
        })
    }

    /// Decodes a document from an extended-JSON object string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not a JSON object or a
    /// value is not supported.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidInput(format!("malformed document: {e}")))?;
        let serde_json::Value::Object(map) = json else {
            return Err(Error::InvalidInput(
                "document must be a JSON object".to_string(),
            ));
        };

        let mut document = Self::new();
        for (key, value) in &map {
            document.insert(key.clone(), Value::from_json(value)?);
        }
        Ok(document)
    }
}

/// Store-assigned document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(i64);

impl DocumentId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document together with its store-assigned identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Identity assigned by the store.
    pub id: DocumentId,
    /// The document body, without identity.
    pub document: Document,
}

impl StoredDocument {
    /// Drops the identity and returns the body.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }
}
