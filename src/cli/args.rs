//! CLI argument definitions using clap
//!
//! Commands:
//! - recordstore --config <path> init
//! - recordstore --config <path> verify
//! - recordstore --config <path> monitored
//! - recordstore --config <path> refresh --entity <name> [--reason <text>]
//! - recordstore --config <path> dump --entity <name>
//! - recordstore --config <path> table-info --entity <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Schema-validated record store administration
#[derive(Parser, Debug)]
#[command(name = "recordstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./recordstore.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store for every known entity
    Init,

    /// Verify every monitored file against the integrity ledger
    Verify,

    /// List every monitored file with its current status
    Monitored,

    /// Accept the current contents of an entity's data file as known-good
    Refresh {
        #[arg(long)]
        entity: String,

        #[arg(long, default_value = "manual_refresh")]
        reason: String,
    },

    /// Print every record of an entity as JSON lines
    Dump {
        #[arg(long)]
        entity: String,
    },

    /// Print the relational table description of an entity
    TableInfo {
        #[arg(long)]
        entity: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
