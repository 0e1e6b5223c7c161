//! recordstore - schema-validated record storage
//!
//! Typed records, validated against a schema descriptor, kept either in
//! integrity-audited CSV files or in a pooled SQLite database behind one
//! store contract.

pub mod cli;
pub mod config;
pub mod file_store;
pub mod filter;
pub mod integrity;
pub mod observability;
pub mod relational;
pub mod schema;
pub mod store;
