//! Integrity subsystem
//!
//! Tamper auditing for file-backed stores. The ledger records the SHA-256
//! of each monitored file after every successful mutation; a later
//! mismatch means something outside the store changed the file.
//!
//! Integrity checking is advisory. A mismatch is reported and logged,
//! never raised, and never blocks an operation.

mod errors;
mod hash;
mod ledger;

pub use errors::{IntegrityError, IntegrityResult};
pub use hash::{calculate_hash, hash_bytes};
pub use ledger::{
    ledger_key, HashEntry, IntegrityLedger, MonitoredFile, VerifyAllReport, VerifyReport,
};
