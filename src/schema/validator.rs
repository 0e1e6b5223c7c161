//! Record validation and defaulting
//!
//! Insert semantics, per declared field in schema order:
//! 1. present in input: coerce to the field type, check the allowed set
//! 2. identity field: assign the next sequence value or a fresh UUID
//! 3. auto-timestamp name (`created_at`, `updated_at`, `registered_at`,
//!    `last_login`): current local time, whole seconds
//! 4. declared default
//! 5. required: reject
//! 6. otherwise: the backend's neutral value
//!
//! Input fields the schema does not declare are dropped, so the result holds
//! exactly the schema's fields.

use chrono::{Local, NaiveDateTime};
use uuid::Uuid;

use super::codec::ValueCodec;
use super::errors::{SchemaError, SchemaResult};
use super::types::{IdentityKind, SchemaDescriptor, AUTO_TIMESTAMP_FIELDS, UPDATED_AT_FIELD};
use super::value::{coerce, whole_seconds, Record, Value};
use crate::observability::Logger;

/// How an absent sequence identity is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFill {
    /// The store computed the next value up front
    Assign(i64),
    /// The backend assigns the value itself (left as Null)
    Deferred,
}

/// Current local time truncated to whole seconds, matching the text format.
pub fn now_timestamp() -> NaiveDateTime {
    whole_seconds(Local::now().naive_local())
}

fn present<'a>(input: &'a Record, field: &str) -> Option<&'a Value> {
    input.get(field).filter(|v| !v.is_null())
}

impl SchemaDescriptor {
    /// Validates insert input and fills every absent field.
    ///
    /// # Errors
    ///
    /// - `REC_SCHEMA_FIELD_REQUIRED` if a required field has no value,
    ///   default or auto-fill
    /// - `REC_SCHEMA_COERCION_FAILED` if a supplied value does not fit its type
    /// - `REC_SCHEMA_VALUE_NOT_ALLOWED` if a supplied value is outside the
    ///   field's allowed set
    pub fn validate_and_fill<C: ValueCodec>(
        &self,
        input: &Record,
        codec: &C,
        sequence: SequenceFill,
    ) -> SchemaResult<Record> {
        let identity = self.identity();
        let mut record = Record::new();

        for (name, spec) in self.fields() {
            let value = if let Some(raw) = present(input, name) {
                let coerced = coerce(name, &spec.field_type, raw.clone())
                    .map_err(|e| e.in_entity(self.entity()))?;
                if !spec.permits(&coerced) {
                    return Err(SchemaError::value_not_allowed(
                        self.entity(),
                        name,
                        &coerced.to_text(),
                        spec.allowed.as_deref().unwrap_or_default(),
                    ));
                }
                coerced
            } else if let Some(id) = identity.filter(|id| id.field == name) {
                match (id.kind, sequence) {
                    (IdentityKind::Uuid, _) => Value::Uuid(Uuid::new_v4()),
                    (IdentityKind::Sequence, SequenceFill::Assign(next)) => Value::Integer(next),
                    (IdentityKind::Sequence, SequenceFill::Deferred) => Value::Null,
                }
            } else if AUTO_TIMESTAMP_FIELDS.contains(&name) {
                coerce(name, &spec.field_type, Value::Timestamp(now_timestamp()))
                    .map_err(|e| e.in_entity(self.entity()))?
            } else if let Some(default) = &spec.default {
                default.clone()
            } else if spec.required {
                return Err(SchemaError::field_required(self.entity(), name));
            } else {
                codec.neutral(&spec.field_type)
            };

            record.set(name, value);
        }

        Ok(record)
    }

    /// Restricts update changes to values the schema accepts.
    ///
    /// Unknown fields are dropped. Values that fail coercion or fall outside
    /// the field's allowed set are skipped with an `UPDATE_FIELD_SKIPPED`
    /// warning rather than rejected. The `updated_at` field, when declared,
    /// is always refreshed.
    pub fn prepare_changes(&self, changes: &Record) -> Record {
        let mut prepared = Record::new();

        for (name, raw) in changes.iter() {
            let Some(spec) = self.field(name) else {
                continue;
            };
            let coerced = match coerce(name, &spec.field_type, raw.clone()) {
                Ok(v) => v,
                Err(e) => {
                    Logger::warn(
                        "UPDATE_FIELD_SKIPPED",
                        &[
                            ("entity", self.entity()),
                            ("field", name),
                            ("reason", e.message()),
                        ],
                    );
                    continue;
                }
            };
            if !spec.permits(&coerced) {
                let text = coerced.to_text();
                Logger::warn(
                    "UPDATE_FIELD_SKIPPED",
                    &[
                        ("entity", self.entity()),
                        ("field", name),
                        ("reason", "value not allowed"),
                        ("value", &text),
                    ],
                );
                continue;
            }
            prepared.set(name, coerced);
        }

        if let Some(spec) = self.field(UPDATED_AT_FIELD) {
            if let Ok(now) = coerce(
                UPDATED_AT_FIELD,
                &spec.field_type,
                Value::Timestamp(now_timestamp()),
            ) {
                prepared.set(UPDATED_AT_FIELD, now);
            }
        }

        prepared
    }
}
