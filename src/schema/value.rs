//! Tagged values and records
//!
//! Every value crossing the store boundary is a [`Value`]. Conversion into a
//! field's storage representation goes through [`coerce`], which matches
//! exhaustively on [`FieldType`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::{Map, Number, Value as JsonValue};
use uuid::Uuid;

use super::errors::{SchemaError, SchemaResult};
use super::types::FieldType;

/// Canonical textual timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Drops sub-second precision, which the canonical format cannot hold.
pub fn whole_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent / empty
    Null,
    /// UTF-8 text
    Text(String),
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean
    Boolean(bool),
    /// 64-bit float
    Float(f64),
    /// Naive timestamp (UTC by convention)
    Timestamp(NaiveDateTime),
    /// Structured JSON (lists and objects)
    Json(JsonValue),
    /// UUID
    Uuid(Uuid),
}

impl Value {
    /// Returns the variant name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Float(_) => "float",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Uuid(_) => "uuid",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual rendering used for equality filters and CSV cells
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Value::Json(v) => v.to_string(),
            Value::Uuid(u) => u.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Builds a value from caller JSON.
    ///
    /// Scalars map to their natural variant, arrays and objects stay JSON.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }

    /// JSON rendering for dumps and API responses
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Timestamp(_) | Value::Uuid(_) => JsonValue::String(self.to_text()),
            Value::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Json(JsonValue::Array(
            items.into_iter().map(|v| v.into().to_json()).collect(),
        ))
    }
}

/// Parses the timestamp formats accepted on input.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn mismatch(field: &str, field_type: &FieldType, value: &Value) -> SchemaError {
    SchemaError::coercion_failed(
        field,
        field_type.type_name(),
        format!("{} '{}'", value.kind(), value.to_text()),
    )
}

/// Converts `value` into the storage representation of `field_type`.
///
/// Null passes through unchanged for every type.
pub fn coerce(field: &str, field_type: &FieldType, value: Value) -> SchemaResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match field_type {
        FieldType::Text | FieldType::Date | FieldType::Time => Ok(match value {
            Value::Text(s) => Value::Text(s),
            Value::Timestamp(ts) if *field_type == FieldType::Date => {
                Value::Text(ts.format("%Y-%m-%d").to_string())
            }
            Value::Timestamp(ts) if *field_type == FieldType::Time => {
                Value::Text(ts.format("%H:%M:%S").to_string())
            }
            other => Value::Text(other.to_text()),
        }),
        FieldType::Integer | FieldType::Serial => match value {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Boolean(b) => Ok(Value::Integer(b as i64)),
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            Value::Float(f)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Ok(Value::Integer(f as i64))
            }
            Value::Text(ref s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| mismatch(field, field_type, &value)),
            other => Err(mismatch(field, field_type, &other)),
        },
        FieldType::Boolean => match value {
            Value::Boolean(b) => Ok(Value::Boolean(b)),
            Value::Integer(0) => Ok(Value::Boolean(false)),
            Value::Integer(1) => Ok(Value::Boolean(true)),
            Value::Text(ref s) => parse_bool(s)
                .map(Value::Boolean)
                .ok_or_else(|| mismatch(field, field_type, &value)),
            other => Err(mismatch(field, field_type, &other)),
        },
        FieldType::Float | FieldType::Double => match value {
            Value::Float(f) => Ok(Value::Float(f)),
            Value::Integer(i) => Ok(Value::Float(i as f64)),
            Value::Text(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(field, field_type, &value)),
            other => Err(mismatch(field, field_type, &other)),
        },
        FieldType::Timestamp => match value {
            Value::Timestamp(ts) => Ok(Value::Timestamp(whole_seconds(ts))),
            Value::Text(ref s) => parse_timestamp(s)
                .map(|ts| Value::Timestamp(whole_seconds(ts)))
                .ok_or_else(|| mismatch(field, field_type, &value)),
            other => Err(mismatch(field, field_type, &other)),
        },
        FieldType::Json => Ok(match value {
            Value::Json(v) => Value::Json(v),
            Value::Text(s) => match serde_json::from_str::<JsonValue>(&s) {
                Ok(parsed) => Value::Json(parsed),
                Err(_) => Value::Json(JsonValue::String(s)),
            },
            other => Value::Json(other.to_json()),
        }),
        FieldType::Uuid => match value {
            Value::Uuid(u) => Ok(Value::Uuid(u)),
            Value::Text(ref s) => Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|_| mismatch(field, field_type, &value)),
            other => Err(mismatch(field, field_type, &other)),
        },
    }
}

/// An ordered mapping from field name to value.
///
/// Records returned by a store always carry every schema field in schema
/// order. Records built by callers may hold any subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field, replacing any previous value in place
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Builds a record from a JSON object; other JSON shapes yield `None`.
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(map) => Some(Self {
                entries: map
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (name, value) in &self.entries {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.set(field, value);
        }
        record
    }
}
