//! Schema loader for schema files on disk
//!
//! One JSON file per entity:
//!
//! ```json
//! {
//!   "entity": "tasks",
//!   "fields": [
//!     { "name": "task_id", "type": "serial" },
//!     { "name": "title", "type": "text", "required": true, "indexed": true },
//!     { "name": "status", "type": "text", "default": "todo",
//!       "allowed": ["todo", "in_progress", "done"] }
//!   ]
//! }
//! ```
//!
//! Fields are a list so declaration order survives parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldSpec, SchemaDescriptor};

#[derive(Debug, Serialize, Deserialize)]
struct SchemaFile {
    entity: String,
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldEntry {
    name: String,
    #[serde(flatten)]
    spec: FieldSpec,
}

/// Parses a schema document.
pub fn parse_schema(json: &str) -> Result<SchemaDescriptor, String> {
    let file: SchemaFile = serde_json::from_str(json).map_err(|e| format!("Invalid JSON: {}", e))?;
    file.fields
        .into_iter()
        .fold(SchemaDescriptor::builder(file.entity), |b, entry| {
            b.field(entry.name, entry.spec)
        })
        .build()
        .map_err(|e| e.message().to_string())
}

/// Renders a schema in the on-disk format.
pub fn schema_to_json(schema: &SchemaDescriptor) -> String {
    let file = SchemaFile {
        entity: schema.entity().to_string(),
        fields: schema
            .fields()
            .map(|(name, spec)| FieldEntry {
                name: name.to_string(),
                spec: spec.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&file).unwrap_or_default()
}

/// Loads schema files from a directory into a registry keyed by entity.
pub struct SchemaLoader {
    schema_dir: PathBuf,
    schemas: BTreeMap<String, SchemaDescriptor>,
}

impl SchemaLoader {
    pub fn new(schema_dir: &Path) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            schemas: BTreeMap::new(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads every `*.json` file in the schema directory.
    ///
    /// A missing directory is an empty registry; malformed files are errors.
    pub fn load_all(&mut self) -> SchemaResult<()> {
        if !self.schema_dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::file_invalid(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::file_invalid(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            self.load_schema_file(&path)?;
        }

        Ok(())
    }

    fn load_schema_file(&mut self, path: &Path) -> SchemaResult<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::file_invalid(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;
        let schema = parse_schema(&content)
            .map_err(|reason| SchemaError::file_invalid(path.display().to_string(), reason))?;
        self.register(schema)
    }

    /// Registers a schema; a second schema for the same entity is rejected.
    pub fn register(&mut self, schema: SchemaDescriptor) -> SchemaResult<()> {
        if self.schemas.contains_key(schema.entity()) {
            return Err(SchemaError::definition_invalid(
                schema.entity(),
                "entity already registered",
            ));
        }
        self.schemas.insert(schema.entity().to_string(), schema);
        Ok(())
    }

    pub fn get(&self, entity: &str) -> Option<&SchemaDescriptor> {
        self.schemas.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.schemas.values()
    }
}
