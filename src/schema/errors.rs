//! Schema error types
//!
//! Error codes:
//! - REC_SCHEMA_FIELD_REQUIRED (REJECT)
//! - REC_SCHEMA_COERCION_FAILED (REJECT)
//! - REC_SCHEMA_VALUE_NOT_ALLOWED (REJECT)
//! - REC_SCHEMA_DEFINITION_INVALID (FATAL)
//! - REC_SCHEMA_FILE_INVALID (FATAL)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The write is rejected, nothing was mutated
    Reject,
    /// The schema itself is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Required field missing with no default or auto-fill
    FieldRequired,
    /// Value could not be converted to the field's storage type
    CoercionFailed,
    /// Value outside the field's allowed set
    ValueNotAllowed,
    /// Schema definition is inconsistent
    DefinitionInvalid,
    /// Schema file could not be read or parsed
    FileInvalid,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::FieldRequired => "REC_SCHEMA_FIELD_REQUIRED",
            SchemaErrorCode::CoercionFailed => "REC_SCHEMA_COERCION_FAILED",
            SchemaErrorCode::ValueNotAllowed => "REC_SCHEMA_VALUE_NOT_ALLOWED",
            SchemaErrorCode::DefinitionInvalid => "REC_SCHEMA_DEFINITION_INVALID",
            SchemaErrorCode::FileInvalid => "REC_SCHEMA_FILE_INVALID",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::DefinitionInvalid | SchemaErrorCode::FileInvalid => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    /// Entity the schema describes, if known
    entity: Option<String>,
    /// Offending field, if applicable
    field: Option<String>,
}

impl SchemaError {
    /// Required field missing from insert input
    pub fn field_required(entity: &str, field: &str) -> Self {
        Self {
            code: SchemaErrorCode::FieldRequired,
            message: format!("Required field '{}' is missing", field),
            entity: Some(entity.to_string()),
            field: Some(field.to_string()),
        }
    }

    /// Value cannot be represented as the field's type
    pub fn coercion_failed(field: &str, expected: &str, actual: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::CoercionFailed,
            message: format!(
                "field '{}': expected {}, got {}",
                field,
                expected,
                actual.into()
            ),
            entity: None,
            field: Some(field.to_string()),
        }
    }

    /// Value is not one of the field's allowed values
    pub fn value_not_allowed(entity: &str, field: &str, value: &str, allowed: &[String]) -> Self {
        Self {
            code: SchemaErrorCode::ValueNotAllowed,
            message: format!(
                "field '{}': '{}' is not one of [{}]",
                field,
                value,
                allowed.join(", ")
            ),
            entity: Some(entity.to_string()),
            field: Some(field.to_string()),
        }
    }

    /// Schema definition rejected at build time
    pub fn definition_invalid(entity: &str, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::DefinitionInvalid,
            message: format!("Invalid schema '{}': {}", entity, reason.into()),
            entity: Some(entity.to_string()),
            field: None,
        }
    }

    /// Schema file unreadable or malformed
    pub fn file_invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::FileInvalid,
            message: format!("Malformed schema file '{}': {}", path.into(), reason.into()),
            entity: None,
            field: None,
        }
    }

    /// Attaches the entity name when the error was raised without one
    pub(crate) fn in_entity(mut self, entity: &str) -> Self {
        if self.entity.is_none() {
            self.entity = Some(entity.to_string());
        }
        self
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the entity name if known
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Returns the offending field if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code.code(), self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " (entity '{}')", entity)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
