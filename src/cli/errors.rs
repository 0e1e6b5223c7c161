//! CLI-specific error types
//!
//! Every CLI error is fatal: `main` prints it and exits with status 1.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::integrity::IntegrityError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Integrity(#[from] IntegrityError),

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("{0}")]
    Unsupported(String),

    /// Reported after the verification result has been printed
    #[error("{0} monitored file(s) failed verification")]
    VerificationFailed(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
