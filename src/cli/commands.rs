//! CLI command implementations
//!
//! Every command loads and validates the configuration, applies its log
//! level, and builds the schema catalog (built-in entities plus any
//! `schema_dir` files) before doing its work.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Backend, StoreConfig};
use crate::file_store::FileStore;
use crate::integrity::IntegrityLedger;
use crate::observability::Logger;
use crate::relational::RelationalStore;
use crate::schema::{catalog, SchemaDescriptor, SchemaLoader};
use crate::store::open_store;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_json, write_json_lines};

/// Configuration, schemas and ledger shared by every command
struct Context {
    config: StoreConfig,
    schemas: SchemaLoader,
    ledger: Arc<IntegrityLedger>,
}

impl Context {
    fn load(config_path: &Path) -> CliResult<Self> {
        let config = StoreConfig::load(config_path)?;
        Logger::set_min_severity(config.severity()?);

        let mut schemas = match &config.schema_dir {
            Some(dir) => {
                let mut loader = SchemaLoader::new(dir);
                loader.load_all()?;
                loader
            }
            None => SchemaLoader::new(&config.data_dir.join("schemas")),
        };
        catalog::register_builtin(&mut schemas)?;

        let ledger = Arc::new(IntegrityLedger::open(config.ledger_path()));
        Ok(Self {
            config,
            schemas,
            ledger,
        })
    }

    fn schema(&self, entity: &str) -> CliResult<SchemaDescriptor> {
        self.schemas
            .get(entity)
            .cloned()
            .ok_or_else(|| CliError::UnknownEntity(entity.to_string()))
    }
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(&cli.config, cli.command)
}

pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init => init(config_path),
        Command::Verify => verify(config_path),
        Command::Monitored => monitored(config_path),
        Command::Refresh { entity, reason } => refresh(config_path, &entity, &reason),
        Command::Dump { entity } => dump(config_path, &entity),
        Command::TableInfo { entity } => table_info(config_path, &entity),
    }
}

/// Opens (creating where missing) the store of every known entity.
pub fn init(config_path: &Path) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    std::fs::create_dir_all(&ctx.config.data_dir)?;

    let mut entities = Vec::new();
    for schema in ctx.schemas.schemas() {
        open_store(&ctx.config, schema.clone(), Arc::clone(&ctx.ledger))?;
        entities.push(schema.entity().to_string());
    }

    write_json(&serde_json::json!({ "initialized": entities }))
}

/// Prints the full verification report. Fails after printing when any
/// monitored file is invalid.
pub fn verify(config_path: &Path) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    let report = ctx.ledger.verify_all()?;
    write_json(&report)?;

    if report.all_valid() {
        Ok(())
    } else {
        Err(CliError::VerificationFailed(report.total_invalid))
    }
}

pub fn monitored(config_path: &Path) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    write_json(&ctx.ledger.list_monitored()?)
}

/// Accepts the entity data file's current contents as known-good.
pub fn refresh(config_path: &Path, entity: &str, reason: &str) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    let schema = ctx.schema(entity)?;
    let store = FileStore::open(
        ctx.config.data_file(entity),
        schema,
        Arc::clone(&ctx.ledger),
        ctx.config.identity_policy,
    )?;
    let hash = store.force_integrity_refresh(reason)?;

    write_json(&serde_json::json!({
        "entity": entity,
        "hash": hash,
        "path": store.path().display().to_string(),
        "reason": reason,
    }))
}

pub fn dump(config_path: &Path, entity: &str) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    let schema = ctx.schema(entity)?;
    let store = open_store(&ctx.config, schema, Arc::clone(&ctx.ledger))?;
    let records = store.read_all()?;
    write_json_lines(records.iter().map(|record| record.to_json()))
}

pub fn table_info(config_path: &Path, entity: &str) -> CliResult<()> {
    let ctx = Context::load(config_path)?;
    if ctx.config.backend != Backend::Relational {
        return Err(CliError::Unsupported(
            "table-info requires the relational backend".to_string(),
        ));
    }
    let schema = ctx.schema(entity)?;
    let store = RelationalStore::open(&ctx.config.relational, schema, ctx.config.identity_policy)?;
    let info = store.get_table_info()?;
    store.close();
    write_json(&info)
}
