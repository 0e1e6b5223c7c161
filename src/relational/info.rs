//! Table introspection

use rusqlite::Connection;
use serde::Serialize;

use super::ddl::quote_ident;
use crate::store::StoreResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// Columns, secondary indexes and row count of one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub table: String,
    pub row_count: i64,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

pub(crate) fn read_table_info(conn: &Connection, table: &str) -> StoreResult<TableInfo> {
    let quoted = quote_ident(table)?;

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get("name")?,
                data_type: row.get("type")?,
                not_null: row.get::<_, i64>("notnull")? != 0,
                default: row.get("dflt_value")?,
                primary_key: row.get::<_, i64>("pk")? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    // Automatic indexes (sqlite_autoindex_*) back constraints, not schema flags
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quoted))?;
    let listed = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>("name")?, row.get::<_, i64>("unique")? != 0))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut indexes = Vec::new();
    for (name, unique) in listed {
        if name.starts_with("sqlite_autoindex_") {
            continue;
        }
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quote_ident(&name)?))?;
        let mut cols = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>("seqno")?, row.get::<_, String>("name")?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        cols.sort_by_key(|(seqno, _)| *seqno);
        indexes.push(IndexInfo {
            name,
            unique,
            columns: cols.into_iter().map(|(_, col)| col).collect(),
        });
    }
    indexes.sort_by(|a, b| a.name.cmp(&b.name));

    let row_count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", quoted), [], |row| {
        row.get(0)
    })?;

    Ok(TableInfo {
        table: table.to_string(),
        row_count,
        columns,
        indexes,
    })
}
