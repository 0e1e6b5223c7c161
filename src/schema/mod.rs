//! Schema subsystem
//!
//! A [`SchemaDescriptor`] is the single authority for what a valid record of
//! one entity type looks like. Stores validate and default every insert
//! through it and restrict every update to its fields.
//!
//! # Design Principles
//!
//! - Field order is declaration order, everywhere
//! - Validation completes before any mutation
//! - Tagged values, one codec per backend
//! - Type tags drive coercion only; business enums live in `allowed`

pub mod catalog;
mod codec;
mod errors;
mod loader;
mod types;
mod validator;
mod value;

pub use codec::ValueCodec;
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity};
pub use loader::{parse_schema, schema_to_json, SchemaLoader};
pub use types::{
    FieldSpec, FieldType, Identity, IdentityKind, SchemaBuilder, SchemaDescriptor,
    AUTO_TIMESTAMP_FIELDS, UPDATED_AT_FIELD,
};
pub use validator::{now_timestamp, SequenceFill};
pub use value::{coerce, parse_timestamp, whole_seconds, Record, Value, TIMESTAMP_FORMAT};
