//! # Integrity Errors

use std::io;
use std::path::Path;

use thiserror::Error;

/// Result type for integrity operations
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Integrity ledger errors
///
/// Hash mismatches are not errors: they are reported through
/// `VerifyReport` and logged, never raised.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntegrityError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        IntegrityError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
