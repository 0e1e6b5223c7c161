//! Table and index DDL
//!
//! Type mapping:
//!
//! | Tag       | Column type        |
//! |-----------|--------------------|
//! | text      | TEXT               |
//! | integer   | INTEGER            |
//! | boolean   | BOOLEAN            |
//! | float     | REAL               |
//! | double    | DOUBLE PRECISION   |
//! | timestamp | TIMESTAMP          |
//! | date      | DATE               |
//! | time      | TIME               |
//! | json      | JSON               |
//! | uuid      | UUID               |
//! | serial    | INTEGER PRIMARY KEY|
//!
//! Identifiers are validated and double-quoted; values never appear in SQL
//! text except as escaped column defaults.

use std::sync::OnceLock;

use regex::Regex;

use crate::schema::{FieldSpec, FieldType, IdentityKind, SchemaDescriptor, Value};
use crate::store::{IdentityPolicy, StoreError, StoreResult};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Validates and double-quotes an identifier
pub fn quote_ident(name: &str) -> StoreResult<String> {
    if !identifier_pattern().is_match(name) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

pub fn column_type(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "TEXT",
        FieldType::Integer | FieldType::Serial => "INTEGER",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Float => "REAL",
        FieldType::Double => "DOUBLE PRECISION",
        FieldType::Timestamp => "TIMESTAMP",
        FieldType::Date => "DATE",
        FieldType::Time => "TIME",
        FieldType::Json => "JSON",
        FieldType::Uuid => "UUID",
    }
}

/// SQL literal for a column default
fn default_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Boolean(b) => (*b as i64).to_string(),
        Value::Float(f) => f.to_string(),
        other => format!("'{}'", other.to_text().replace('\'', "''")),
    }
}

fn column_def(
    schema: &SchemaDescriptor,
    name: &str,
    spec: &FieldSpec,
    policy: IdentityPolicy,
) -> StoreResult<String> {
    let column = quote_ident(name)?;
    let identity = schema.identity().filter(|id| id.field == name);

    let def = match identity.map(|id| id.kind) {
        Some(IdentityKind::Sequence) => match policy {
            IdentityPolicy::ReuseMax => format!("{} INTEGER PRIMARY KEY", column),
            IdentityPolicy::Monotonic => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column),
        },
        Some(IdentityKind::Uuid) => format!("{} UUID PRIMARY KEY NOT NULL", column),
        None => {
            let mut def = format!("{} {}", column, column_type(&spec.field_type));
            if spec.required {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &spec.default {
                def.push_str(" DEFAULT ");
                def.push_str(&default_literal(default));
            }
            def
        }
    };
    Ok(def)
}

/// `CREATE TABLE IF NOT EXISTS` for the schema, columns in schema order
pub fn create_table_sql(schema: &SchemaDescriptor, policy: IdentityPolicy) -> StoreResult<String> {
    let table = quote_ident(schema.entity())?;
    let columns = schema
        .fields()
        .map(|(name, spec)| column_def(schema, name, spec, policy))
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table,
        columns.join(",\n    ")
    ))
}

/// One secondary index statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatement {
    pub name: String,
    pub unique: bool,
    pub sql: String,
}

/// Index statements: a unique index per `unique` field (identity excluded,
/// it is the primary key), a plain index per other `indexed` field.
pub fn index_statements(schema: &SchemaDescriptor) -> StoreResult<Vec<IndexStatement>> {
    let table = quote_ident(schema.entity())?;
    let identity = schema.identity().map(|id| id.field.as_str());
    let mut statements = Vec::new();

    for (name, spec) in schema.fields() {
        if Some(name) == identity || !(spec.unique || spec.indexed) {
            continue;
        }
        let column = quote_ident(name)?;
        let (prefix, keyword) = if spec.unique {
            ("uniq", "UNIQUE INDEX")
        } else {
            ("idx", "INDEX")
        };
        let index_name = format!("{}_{}_{}", prefix, schema.entity(), name);
        statements.push(IndexStatement {
            sql: format!(
                "CREATE {} IF NOT EXISTS {} ON {} ({})",
                keyword,
                quote_ident(&index_name)?,
                table,
                column
            ),
            name: index_name,
            unique: spec.unique,
        });
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks_schema() -> SchemaDescriptor {
        SchemaDescriptor::builder("tasks")
            .field("task_id", FieldSpec::serial())
            .field("title", FieldSpec::text().required())
            .field("status", FieldSpec::text().default_value("todo").indexed())
            .field("owner", FieldSpec::text().unique())
            .field("done", FieldSpec::boolean().default_value(false))
            .build()
            .unwrap()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("tasks").unwrap(), "\"tasks\"");
        assert!(quote_ident("tasks; DROP TABLE users").is_err());
        assert!(quote_ident("1abc").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(&tasks_schema(), IdentityPolicy::ReuseMax).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"tasks\""));
        assert!(sql.contains("\"task_id\" INTEGER PRIMARY KEY,"));
        assert!(sql.contains("\"title\" TEXT NOT NULL"));
        assert!(sql.contains("\"status\" TEXT DEFAULT 'todo'"));
        assert!(sql.contains("\"done\" BOOLEAN DEFAULT 0"));
        assert!(!sql.contains("AUTOINCREMENT"));
    }

    #[test]
    fn test_monotonic_uses_autoincrement() {
        let sql = create_table_sql(&tasks_schema(), IdentityPolicy::Monotonic).unwrap();
        assert!(sql.contains("\"task_id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
    }

    #[test]
    fn test_index_statements() {
        let statements = index_statements(&tasks_schema()).unwrap();
        let names: Vec<_> = statements.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["idx_tasks_status", "uniq_tasks_owner"]);
        assert!(statements[1].sql.starts_with("CREATE UNIQUE INDEX"));
    }

    #[test]
    fn test_default_literal_escapes_quotes() {
        assert_eq!(default_literal(&Value::from("it's")), "'it''s'");
    }
}
