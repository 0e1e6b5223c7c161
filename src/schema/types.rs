//! Schema type definitions
//!
//! Supported type tags:
//! - text, integer, boolean, float, double
//! - timestamp, date, time
//! - json (lists and objects)
//! - uuid
//! - serial (auto-assigned integer identity)
//!
//! Tags are descriptive: they drive coercion into the backend's storage
//! representation and the relational column type, nothing more.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::value::Value;

/// Field type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(alias = "str", alias = "string")]
    Text,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "bool")]
    Boolean,
    Float,
    Double,
    #[serde(alias = "datetime")]
    Timestamp,
    Date,
    Time,
    #[serde(alias = "jsonb")]
    Json,
    Uuid,
    Serial,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Json => "json",
            FieldType::Uuid => "uuid",
            FieldType::Serial => "serial",
        }
    }

    /// Text-like tags are stored verbatim
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Date | FieldType::Time)
    }
}

/// Names filled with the current timestamp when absent from insert input.
pub const AUTO_TIMESTAMP_FIELDS: [&str; 4] = ["created_at", "updated_at", "registered_at", "last_login"];

/// Field refreshed on every update when the schema declares it.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Per-field contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field data type
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: FieldType,
    /// Whether the caller must supply the field on insert
    #[serde(default)]
    pub required: bool,
    /// Value used when the field is absent on insert
    #[serde(default, skip_serializing_if = "Option::is_none", with = "json_default")]
    pub default: Option<Value>,
    /// Secondary index on the relational backend
    #[serde(default)]
    pub indexed: bool,
    /// Identity field (integer or uuid)
    #[serde(default)]
    pub primary_key: bool,
    /// Enforce distinct values across records
    #[serde(default)]
    pub unique: bool,
    /// Closed set of permitted values, compared textually
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

fn default_field_type() -> FieldType {
    FieldType::Text
}

mod json_default {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value as JsonValue;

    use crate::schema::value::Value;

    pub fn serialize<S: Serializer>(value: &Option<Value>, s: S) -> Result<S::Ok, S::Error> {
        value.as_ref().map(Value::to_json).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(Option::<JsonValue>::deserialize(d)?.map(Value::from_json))
    }
}

impl FieldSpec {
    /// Creates an optional field of the given type
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            indexed: false,
            primary_key: false,
            unique: false,
            allowed: None,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn json() -> Self {
        Self::new(FieldType::Json)
    }

    pub fn uuid() -> Self {
        Self::new(FieldType::Uuid)
    }

    /// Auto-assigned integer identity
    pub fn serial() -> Self {
        Self {
            required: true,
            primary_key: true,
            ..Self::new(FieldType::Serial)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `value` passes the allowed-set check. Null always passes.
    pub fn permits(&self, value: &Value) -> bool {
        match &self.allowed {
            Some(allowed) if !value.is_null() => {
                let text = value.to_text();
                allowed.iter().any(|candidate| *candidate == text)
            }
            _ => true,
        }
    }
}

/// How a schema's identity field is filled on insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Integer sequence
    Sequence,
    /// Random v4 UUID
    Uuid,
}

/// The schema's identity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub field: String,
    pub kind: IdentityKind,
}

/// Declarative contract for one entity type.
///
/// Field order is significant: it is the CSV header order, the column
/// order and the order of every record the stores return.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    entity: String,
    fields: Vec<(String, FieldSpec)>,
    identity: Option<Identity>,
}

impl SchemaDescriptor {
    /// Starts a builder for `entity`
    pub fn builder(entity: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    /// Entity name (also the relational table name)
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Fields whose values must be distinct: `unique` flags and the identity
    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.unique || spec.primary_key)
            .map(|(name, _)| name.as_str())
    }
}

/// Builder for [`SchemaDescriptor`]
#[derive(Debug)]
pub struct SchemaBuilder {
    entity: String,
    fields: Vec<(String, FieldSpec)>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Validates the definition and freezes it.
    ///
    /// Rejects empty schemas, duplicate field names, more than one identity
    /// field, and defaults that cannot be coerced to their field's type.
    pub fn build(self) -> SchemaResult<SchemaDescriptor> {
        let entity = self.entity;
        if entity.trim().is_empty() {
            return Err(SchemaError::definition_invalid(&entity, "entity name is empty"));
        }
        if self.fields.is_empty() {
            return Err(SchemaError::definition_invalid(&entity, "no fields declared"));
        }

        let mut seen = HashSet::new();
        let mut identity: Option<Identity> = None;
        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, mut spec) in self.fields {
            if name.trim().is_empty() {
                return Err(SchemaError::definition_invalid(&entity, "empty field name"));
            }
            if !seen.insert(name.clone()) {
                return Err(SchemaError::definition_invalid(
                    &entity,
                    format!("duplicate field '{}'", name),
                ));
            }

            let kind = match (spec.field_type, spec.primary_key) {
                (FieldType::Serial, _) => Some(IdentityKind::Sequence),
                (FieldType::Integer, true) => Some(IdentityKind::Sequence),
                (FieldType::Uuid, true) => Some(IdentityKind::Uuid),
                (other, true) => {
                    return Err(SchemaError::definition_invalid(
                        &entity,
                        format!(
                            "primary key '{}' must be serial, integer or uuid, not {}",
                            name,
                            other.type_name()
                        ),
                    ))
                }
                _ => None,
            };
            if let Some(kind) = kind {
                if let Some(existing) = &identity {
                    return Err(SchemaError::definition_invalid(
                        &entity,
                        format!(
                            "identity fields '{}' and '{}' are mutually exclusive",
                            existing.field, name
                        ),
                    ));
                }
                spec.primary_key = true;
                identity = Some(Identity {
                    field: name.clone(),
                    kind,
                });
            }

            if let Some(default) = spec.default.take() {
                let coerced = super::value::coerce(&name, &spec.field_type, default)
                    .map_err(|e| SchemaError::definition_invalid(&entity, e.message().to_string()))?;
                spec.default = Some(coerced);
            }

            fields.push((name, spec));
        }

        Ok(SchemaDescriptor {
            entity,
            fields,
            identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> SchemaDescriptor {
        SchemaDescriptor::builder("scores")
            .field("id", FieldSpec::serial())
            .field("name", FieldSpec::text().required())
            .field("score", FieldSpec::integer().default_value(0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_field_order_preserved() {
        let schema = sample_schema();
        assert_eq!(schema.field_names(), vec!["id", "name", "score"]);
    }

    #[test]
    fn test_serial_is_identity() {
        let schema = sample_schema();
        let identity = schema.identity().unwrap();
        assert_eq!(identity.field, "id");
        assert_eq!(identity.kind, IdentityKind::Sequence);
    }

    #[test]
    fn test_uuid_primary_key_identity() {
        let schema = SchemaDescriptor::builder("docs")
            .field("id", FieldSpec::uuid().primary_key())
            .field("title", FieldSpec::text())
            .build()
            .unwrap();
        assert_eq!(schema.identity().unwrap().kind, IdentityKind::Uuid);
    }

    #[test]
    fn test_two_identities_rejected() {
        let result = SchemaDescriptor::builder("bad")
            .field("id", FieldSpec::serial())
            .field("uid", FieldSpec::uuid().primary_key())
            .build();
        let err = result.unwrap_err();
        assert!(err.message().contains("mutually exclusive"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = SchemaDescriptor::builder("bad")
            .field("a", FieldSpec::text())
            .field("a", FieldSpec::integer())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_text_primary_key_rejected() {
        let result = SchemaDescriptor::builder("bad")
            .field("code", FieldSpec::text().primary_key())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_coerced_at_build() {
        let schema = SchemaDescriptor::builder("users")
            .field("is_active", FieldSpec::boolean().default_value("True"))
            .build()
            .unwrap();
        assert_eq!(
            schema.field("is_active").unwrap().default,
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn test_permits_allowed_set() {
        let spec = FieldSpec::text().allowed(["todo", "done"]);
        assert!(spec.permits(&Value::from("todo")));
        assert!(!spec.permits(&Value::from("archived")));
        assert!(spec.permits(&Value::Null));
    }

    #[test]
    fn test_field_type_aliases_deserialize() {
        let ft: FieldType = serde_json::from_str("\"datetime\"").unwrap();
        assert_eq!(ft, FieldType::Timestamp);
        let ft: FieldType = serde_json::from_str("\"string\"").unwrap();
        assert_eq!(ft, FieldType::Text);
    }
}
