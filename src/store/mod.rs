//! Store contract
//!
//! Both backends implement [`RecordStore`]: the same six operations with the
//! same observable semantics, so callers can swap backends through
//! configuration alone.
//!
//! # Guarantees
//!
//! - Every returned record holds exactly the schema's fields, in schema order
//! - Validation completes before any mutation
//! - Mutations on one store instance are serialized by one in-process lock
//! - No retries, no timeouts (beyond pool acquisition), no cancellation

mod errors;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Backend, StoreConfig};
use crate::file_store::FileStore;
use crate::filter::Filter;
use crate::integrity::IntegrityLedger;
use crate::relational::RelationalStore;
use crate::schema::{Record, SchemaDescriptor};

pub use errors::{StoreError, StoreResult};

/// How sequence identities are generated when absent from insert input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// max(existing) + 1; deleting the highest identity frees it for reuse
    #[default]
    ReuseMax,
    /// Persisted counter; identities are never reused
    Monotonic,
}

/// The record store contract
pub trait RecordStore: Send + Sync {
    /// Schema every record of this store conforms to
    fn schema(&self) -> &SchemaDescriptor;

    /// All records in storage order
    fn read_all(&self) -> StoreResult<Vec<Record>>;

    /// Records matching every term of `filter`, in storage order
    fn find(&self, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// First match of [`find`](Self::find)
    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        Ok(self.find(filter)?.into_iter().next())
    }

    /// Validates, fills and persists `data`. Returns the stored record.
    fn insert(&self, data: &Record) -> StoreResult<Record>;

    /// Applies `changes` to every matching record. Returns whether any
    /// record matched.
    fn update(&self, filter: &Filter, changes: &Record) -> StoreResult<bool>;

    /// Removes every matching record. Returns whether any were removed.
    fn delete(&self, filter: &Filter) -> StoreResult<bool>;
}

/// Builds the configured backend for `schema`.
///
/// The file backend stores `<data_dir>/<entity>.csv` and audits it through
/// `ledger`; the relational backend ignores the ledger.
pub fn open_store(
    config: &StoreConfig,
    schema: SchemaDescriptor,
    ledger: Arc<IntegrityLedger>,
) -> StoreResult<Box<dyn RecordStore>> {
    match config.backend {
        Backend::File => {
            let path = config.data_file(schema.entity());
            let store = FileStore::open(path, schema, ledger, config.identity_policy)?;
            Ok(Box::new(store))
        }
        Backend::Relational => {
            let store = RelationalStore::open(&config.relational, schema, config.identity_policy)?;
            Ok(Box::new(store))
        }
    }
}
