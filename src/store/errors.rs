//! # Store Errors
//!
//! Error types shared by both backends.

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::integrity::IntegrityError;
use crate::schema::SchemaError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
///
/// Integrity mismatches never appear here: they are logged, not raised.
#[derive(Debug, Error)]
pub enum StoreError {
    // ==================
    // Caller Errors
    // ==================
    /// Record rejected by the schema before any mutation
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// A `unique` field value is already taken
    #[error("Unique constraint violated: {field} = '{value}'")]
    UniqueViolation { field: String, value: String },

    /// Filter refers to an unknown field or has an unusable operand
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Operator suffix not supported by this backend
    #[error("Operator '{operator}' on field '{field}' is not supported by the {backend} backend")]
    UnsupportedOperator {
        field: String,
        operator: String,
        backend: &'static str,
    },

    /// The next sequence identity would exceed `i64::MAX`
    #[error("No sequence identity left for '{entity}'")]
    IdentityExhausted { entity: String },

    /// Entity or field name unusable as an SQL identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ==================
    // Backend Errors
    // ==================
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Malformed data file {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Integrity ledger error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No connection available within {0} ms")]
    PoolExhausted(u64),

    #[error("Store is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the caller can fix the request (as opposed to a backend failure)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            StoreError::Schema(_)
                | StoreError::UniqueViolation { .. }
                | StoreError::InvalidFilter(_)
                | StoreError::UnsupportedOperator { .. }
                | StoreError::InvalidIdentifier(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_is_caller_error() {
        let err = StoreError::from(SchemaError::field_required("tasks", "title"));
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_pool_exhausted_display() {
        let err = StoreError::PoolExhausted(250);
        assert!(!err.is_caller_error());
        assert_eq!(err.to_string(), "No connection available within 250 ms");
    }
}
