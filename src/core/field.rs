//! Field kinds, typed field values and record keys

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Maximum length, in characters, of a short string field
pub const MAX_STRING_LENGTH: usize = 500;

/// The closed set of storable field kinds
///
/// Reverse relationships are not a kind: they are derived metadata on the
/// schema and never hold a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Boolean,
    /// Short string bounded by `max_length` characters
    String { max_length: usize },
    /// Unbounded text
    Text,
    /// Binary data, base64 on the wire
    Blob,
    Date,
    Time,
    DateTime,
    /// Pointer to a record of the `target` schema
    Reference { target: String },
}

impl FieldKind {
    /// Short string with the default length bound
    pub fn string() -> Self {
        FieldKind::String {
            max_length: MAX_STRING_LENGTH,
        }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        FieldKind::Reference {
            target: target.into(),
        }
    }

    /// Name used in configuration files and error messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::String { .. } => "string",
            FieldKind::Text => "text",
            FieldKind::Blob => "blob",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::DateTime => "datetime",
            FieldKind::Reference { .. } => "reference",
        }
    }
}

/// Opaque record identity, unique within a schema
///
/// Integer keys sort before string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Id(i64),
    Name(String),
}

fn key_name_regex() -> &'static Regex {
    static KEY_NAME: OnceLock<Regex> = OnceLock::new();
    KEY_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.~-]+$").unwrap())
}

impl RecordKey {
    /// Parse a key from its path form: all digits is an integer id, anything
    /// else a string name
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("key must not be empty".to_string());
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return match s.parse::<i64>() {
                Ok(0) | Err(_) => Err(format!("'{}' is not a valid integer key", s)),
                Ok(id) => Ok(RecordKey::Id(id)),
            };
        }
        if !key_name_regex().is_match(s) {
            return Err(format!(
                "'{}' is not a valid key (allowed: letters, digits, '_', '.', '~', '-')",
                s
            ));
        }
        if s.bytes().all(|b| b == b'.') {
            return Err(format!(
                "'{}' is not a valid key (dot segments are not addressable)",
                s
            ));
        }
        Ok(RecordKey::Name(s.to_string()))
    }

    /// Read a key supplied in a JSON body: a positive integer or a string
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(id) if id > 0 => Ok(RecordKey::Id(id)),
                _ => Err(format!("'{}' is not a valid integer key", n)),
            },
            Value::String(s) => Self::parse(s),
            _ => Err("key must be an integer or a string".to_string()),
        }
    }

    /// Wire form used in representations
    pub fn to_json(&self) -> Value {
        match self {
            RecordKey::Id(id) => Value::from(*id),
            RecordKey::Name(name) => Value::String(name.clone()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{}", id),
            RecordKey::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        RecordKey::Id(id)
    }
}

/// Typed pointer to a record of a given schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRef {
    pub kind: String,
    pub key: RecordKey,
}

impl KeyRef {
    pub fn new(kind: impl Into<String>, key: RecordKey) -> Self {
        Self {
            kind: kind.into(),
            key,
        }
    }
}

/// A typed field value as held by a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Reference(KeyRef),
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&KeyRef> {
        match self {
            FieldValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Integer(_) => 1,
            FieldValue::Float(_) => 2,
            FieldValue::Boolean(_) => 3,
            FieldValue::String(_) => 4,
            FieldValue::Blob(_) => 5,
            FieldValue::Date(_) => 6,
            FieldValue::Time(_) => 7,
            FieldValue::DateTime(_) => 8,
            FieldValue::Reference(_) => 9,
        }
    }

    /// Compare two values of the same kind
    ///
    /// Values of different kinds (and references to different schemas) are
    /// incomparable and yield `None`.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Blob(a), Blob(b)) => Some(a.cmp(b)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Time(a), Time(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (Reference(a), Reference(b)) if a.kind == b.kind => Some(a.key.cmp(&b.key)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then by kind, then by value
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}
