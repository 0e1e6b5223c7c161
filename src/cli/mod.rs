//! CLI module
//!
//! Thin administration surface over the store: initialize entity stores,
//! audit the integrity ledger, and inspect stored records.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{dump, init, monitored, refresh, run, run_command, table_info, verify};
pub use errors::{CliError, CliResult};
