//! File backend
//!
//! CRUD over one CSV file per entity, audited by the integrity ledger.
//!
//! Filters are textual equality only: the filter value is coerced to the
//! field's type and compared with the stored cell's canonical text.

mod codec;
mod sequence;
mod store;

pub use codec::TextCodec;
pub use sequence::SequenceFile;
pub use store::FileStore;
