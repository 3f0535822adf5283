//! Conversion between wire values and typed field values
//!
//! Writes arrive as JSON values ([`decode`]); filter values arrive as raw
//! query-string text ([`decode_text`]). Both produce a [`FieldValue`] or a
//! message describing why the input does not fit the field's kind. Whole
//! submissions go through [`decode_submission`], which gathers every failure
//! into one [`ValidationReport`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::core::error::ValidationReport;
use crate::core::field::{FieldKind, FieldValue, KeyRef, RecordKey};
use crate::core::schema::Schema;
use crate::core::uri::UriBuilder;

pub const DATE_FORMAT: &str = "%Y %b %d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// Decode a JSON wire value for a field of `kind`
///
/// A float field accepts any JSON number, integers included, since many
/// serializers write `2.0` as `2`. The reverse does not hold: an integer
/// field rejects a number with a fractional part or exponent form.
pub fn decode(kind: &FieldKind, wire: &Value, uris: &UriBuilder) -> Result<FieldValue, String> {
    if wire.is_null() {
        return Ok(FieldValue::Null);
    }
    match kind {
        FieldKind::Integer => wire
            .as_i64()
            .map(FieldValue::Integer)
            .ok_or_else(|| "must be an integer".to_string()),
        FieldKind::Float => wire
            .as_f64()
            .map(FieldValue::Float)
            .ok_or_else(|| "must be a number".to_string()),
        FieldKind::Boolean => wire
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| "must be true or false".to_string()),
        FieldKind::Reference { target } => match wire {
            Value::Number(_) => RecordKey::from_json(wire)
                .map(|key| FieldValue::Reference(KeyRef::new(target, key))),
            Value::String(s) => decode_reference(target, s, uris),
            _ => Err(format!("must be a key or URI of a {}", target)),
        },
        _ => match wire {
            Value::String(s) => decode_str(kind, s, uris),
            _ => Err(format!("must be a string ({})", expected_form(kind))),
        },
    }
}

/// Decode a raw query-string value for a field of `kind`
pub fn decode_text(kind: &FieldKind, text: &str, uris: &UriBuilder) -> Result<FieldValue, String> {
    match kind {
        FieldKind::Integer => text
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| format!("'{}' is not an integer", text)),
        FieldKind::Float => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(FieldValue::Float(f)),
            _ => Err(format!("'{}' is not a number", text)),
        },
        FieldKind::Boolean => match text {
            "true" => Ok(FieldValue::Boolean(true)),
            "false" => Ok(FieldValue::Boolean(false)),
            _ => Err(format!("'{}' is not true or false", text)),
        },
        _ => decode_str(kind, text, uris),
    }
}

/// Kinds whose wire form is a string
fn decode_str(kind: &FieldKind, s: &str, uris: &UriBuilder) -> Result<FieldValue, String> {
    match kind {
        FieldKind::String { max_length } => {
            let len = s.chars().count();
            if len > *max_length {
                Err(format!(
                    "must be at most {} characters (got {})",
                    max_length, len
                ))
            } else {
                Ok(FieldValue::String(s.to_string()))
            }
        }
        FieldKind::Text => Ok(FieldValue::String(s.to_string())),
        FieldKind::Blob => STANDARD
            .decode(s)
            .map(FieldValue::Blob)
            .map_err(|e| format!("must be valid base64: {}", e)),
        FieldKind::Date => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|_| format!("must match \"{}\"", expected_form(kind))),
        FieldKind::Time => NaiveTime::parse_from_str(s, TIME_FORMAT)
            .map(FieldValue::Time)
            .map_err(|_| format!("must match \"{}\"", expected_form(kind))),
        FieldKind::DateTime => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
            .map(FieldValue::DateTime)
            .map_err(|_| format!("must match \"{}\"", expected_form(kind))),
        FieldKind::Reference { target } => decode_reference(target, s, uris),
        FieldKind::Integer | FieldKind::Float | FieldKind::Boolean => {
            Err(format!("must be {}", expected_form(kind)))
        }
    }
}

/// A reference is given as the target's key or as the target's item URI
fn decode_reference(target: &str, s: &str, uris: &UriBuilder) -> Result<FieldValue, String> {
    if s.contains("://") || s.starts_with('/') {
        let not_item = || format!("'{}' is not the URI of a {}", s, target);
        let path = uris.parse(s).ok_or_else(not_item)?;
        return match (path.resource, path.key, path.relationship) {
            (Some(resource), Some(key), None) if resource == target => {
                Ok(FieldValue::Reference(KeyRef::new(target, key)))
            }
            _ => Err(not_item()),
        };
    }
    RecordKey::parse(s).map(|key| FieldValue::Reference(KeyRef::new(target, key)))
}

fn expected_form(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Integer => "an integer",
        FieldKind::Float => "a number",
        FieldKind::Boolean => "true or false",
        FieldKind::String { .. } | FieldKind::Text => "text",
        FieldKind::Blob => "base64",
        FieldKind::Date => "YYYY Mon DD",
        FieldKind::Time => "HH:MM:SS",
        FieldKind::DateTime => "YYYY Mon DD HH:MM:SS",
        FieldKind::Reference { .. } => "a key or URI",
    }
}

/// Encode a typed value to its JSON wire form
///
/// References become the absolute URI of the target record; whether that
/// record still exists is the caller's concern.
pub fn encode(value: &FieldValue, uris: &UriBuilder) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Boolean(b) => Value::Bool(*b),
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
        FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        FieldValue::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
        FieldValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        FieldValue::Reference(r) => Value::String(uris.item(&r.kind, &r.key)),
    }
}

/// Which write a submission belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Every declared field gets a value; absent ones are null
    Create,
    /// Only the submitted fields are decoded
    Replace,
}

/// Decode a submitted JSON object against a schema
///
/// Failures are added to `report` rather than returned, so a caller sees
/// every bad field at once. Relationship names are read-only. `key` is the
/// caller's business and other undeclared names are ignored.
pub fn decode_submission(
    schema: &Schema,
    body: &Map<String, Value>,
    submission: Submission,
    uris: &UriBuilder,
    report: &mut ValidationReport,
) -> IndexMap<String, FieldValue> {
    let mut values = IndexMap::new();

    for (name, descriptor) in schema.fields() {
        let Some(wire) = body.get(name) else {
            if submission == Submission::Create {
                if descriptor.required {
                    report.add(name.as_str(), "is required");
                } else {
                    values.insert(name.clone(), FieldValue::Null);
                }
            }
            continue;
        };

        match decode(&descriptor.kind, wire, uris) {
            Ok(FieldValue::Null) if descriptor.required => {
                report.add(name.as_str(), "may not be null");
            }
            Ok(value) => {
                values.insert(name.clone(), value);
            }
            Err(message) => report.add(name.as_str(), message),
        }
    }

    for name in body.keys() {
        if schema.relationship(name).is_some() {
            report.add(name.as_str(), "is a read-only relationship");
        } else if name != "key" && schema.get_field(name).is_none() {
            tracing::debug!(resource = schema.name(), field = %name, "ignoring undeclared field");
        }
    }

    values
}
