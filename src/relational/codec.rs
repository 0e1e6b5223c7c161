//! Native SQLite codec

use rusqlite::types::Value as SqlValue;

use crate::schema::{coerce, FieldType, Value, ValueCodec};

/// Maps tagged values onto SQLite storage classes.
///
/// Booleans are stored as 0/1, timestamps in the canonical text format,
/// JSON as its serialized text, UUIDs as hyphenated text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCodec;

impl SqlCodec {
    /// Tagged value for a raw storage-class value, with no field type
    pub fn raw(stored: SqlValue) -> Value {
        match stored {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Real(f) => Value::Float(f),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

impl ValueCodec for SqlCodec {
    type Stored = SqlValue;

    fn encode(&self, _field_type: &FieldType, value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null,
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Boolean(b) => SqlValue::Integer(*b as i64),
            Value::Float(f) => SqlValue::Real(*f),
            Value::Timestamp(_) | Value::Uuid(_) => SqlValue::Text(value.to_text()),
            Value::Json(v) => SqlValue::Text(v.to_string()),
        }
    }

    fn decode(&self, field_type: &FieldType, stored: SqlValue) -> Value {
        let raw = Self::raw(stored);
        if raw.is_null() {
            return raw;
        }
        coerce("", field_type, raw.clone()).unwrap_or(raw)
    }

    fn neutral(&self, field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Json => Value::Json(serde_json::Value::Object(Default::default())),
            _ => Value::Null,
        }
    }
}
