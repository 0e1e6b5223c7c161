//! SQLite-backed record store
//!
//! One table per entity, created from the schema on first open. Reads run
//! on pooled connections and may proceed concurrently; every mutation is
//! additionally serialized by an in-process mutex so both backends present
//! the same ordering guarantees.

use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value as SqlValue;
use rusqlite::{ffi, params_from_iter, ErrorCode, Row};

use super::codec::SqlCodec;
use super::ddl::{create_table_sql, index_statements, quote_ident};
use super::info::{read_table_info, TableInfo};
use super::pool::ConnectionPool;
use crate::config::RelationalConfig;
use crate::filter::{Filter, FilterValue, Operator, Predicate};
use crate::observability::Logger;
use crate::schema::{coerce, FieldType, Record, SchemaDescriptor, SequenceFill, Value, ValueCodec};
use crate::store::{IdentityPolicy, RecordStore, StoreError, StoreResult};

const BACKEND: &str = "relational";

/// Compiled `WHERE` clause with its bound parameters
#[derive(Debug, Default)]
struct WhereClause {
    sql: String,
    params: Vec<SqlValue>,
}

/// Result of [`RelationalStore::execute_raw`]
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    /// Rows, for statements that produce columns
    pub rows: Vec<Record>,
    /// Rows changed, for statements that do not
    pub affected: usize,
}

pub struct RelationalStore {
    schema: SchemaDescriptor,
    pool: ConnectionPool,
    codec: SqlCodec,
    identity_policy: IdentityPolicy,
    table: String,
    select_list: String,
    write_lock: Mutex<()>,
}

impl RelationalStore {
    /// Opens the pool and creates the table and its indexes if missing.
    ///
    /// A failing plain index is logged and skipped; a failing unique index
    /// is an error, since the constraint could not be enforced.
    pub fn open(
        config: &RelationalConfig,
        schema: SchemaDescriptor,
        identity_policy: IdentityPolicy,
    ) -> StoreResult<Self> {
        let table = quote_ident(schema.entity())?;
        let select_list = schema
            .field_names()
            .into_iter()
            .map(quote_ident)
            .collect::<StoreResult<Vec<_>>>()?
            .join(", ");
        let pool = ConnectionPool::open(config)?;

        {
            let conn = pool.acquire()?;
            let existed: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [schema.entity()],
                |row| row.get(0),
            )?;
            conn.execute_batch(&create_table_sql(&schema, identity_policy)?)?;
            if !existed {
                Logger::info(
                    "TABLE_CREATED",
                    &[("backend", BACKEND), ("entity", schema.entity())],
                );
            }

            for index in index_statements(&schema)? {
                if let Err(e) = conn.execute_batch(&index.sql) {
                    if index.unique {
                        return Err(e.into());
                    }
                    Logger::warn(
                        "INDEX_CREATE_FAILED",
                        &[("index", &index.name), ("reason", &e.to_string())],
                    );
                }
            }
        }

        Logger::info(
            "STORE_INITIALIZED",
            &[("backend", BACKEND), ("entity", schema.entity())],
        );

        Ok(Self {
            schema,
            pool,
            codec: SqlCodec,
            identity_policy,
            table,
            select_list,
            write_lock: Mutex::new(()),
        })
    }

    pub fn identity_policy(&self) -> IdentityPolicy {
        self.identity_policy
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ==================
    // Predicate compilation
    // ==================

    fn operand(&self, field: &str, value: Value) -> StoreResult<SqlValue> {
        let spec = self
            .schema
            .field(field)
            .ok_or_else(|| StoreError::InvalidFilter(format!("unknown field '{}'", field)))?;
        let coerced = coerce(field, &spec.field_type, value)
            .map_err(|e| StoreError::InvalidFilter(e.message().to_string()))?;
        Ok(self.codec.encode(&spec.field_type, &coerced))
    }

    fn compile(&self, filter: &Filter) -> StoreResult<WhereClause> {
        let predicate = Predicate::parse(filter);
        let mut clauses = Vec::with_capacity(predicate.comparisons().len());
        let mut params = Vec::new();

        for comparison in predicate.comparisons() {
            let field = comparison.field.as_str();
            if !self.schema.has_field(field) {
                return Err(StoreError::InvalidFilter(format!("unknown field '{}'", field)));
            }
            let column = quote_ident(field)?;

            match (comparison.operator, &comparison.operand) {
                (Operator::In, operand) => {
                    let values = operand.clone().into_list();
                    if values.is_empty() {
                        clauses.push("0 = 1".to_string());
                        continue;
                    }
                    let placeholders = vec!["?"; values.len()].join(", ");
                    for value in values {
                        params.push(self.operand(field, value)?);
                    }
                    clauses.push(format!("{} IN ({})", column, placeholders));
                }
                (Operator::Eq, FilterValue::Scalar(Value::Null)) => {
                    clauses.push(format!("{} IS NULL", column));
                }
                (Operator::Like, operand) => {
                    params.push(SqlValue::Text(operand.clone().into_scalar().to_text()));
                    clauses.push(format!("{} LIKE ?", column));
                }
                (Operator::Ilike, operand) => {
                    params.push(SqlValue::Text(operand.clone().into_scalar().to_text()));
                    clauses.push(format!("LOWER({}) LIKE LOWER(?)", column));
                }
                (op, operand) => {
                    params.push(self.operand(field, operand.clone().into_scalar())?);
                    clauses.push(format!("{} {} ?", column, op.sql_symbol()));
                }
            }
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Ok(WhereClause { sql, params })
    }

    // ==================
    // Row mapping
    // ==================

    fn row_to_record(&self, row: &Row<'_>) -> rusqlite::Result<Record> {
        self.schema
            .fields()
            .enumerate()
            .map(|(i, (name, spec))| {
                let stored: SqlValue = row.get(i)?;
                Ok((name.to_string(), self.codec.decode(&spec.field_type, stored)))
            })
            .collect()
    }

    fn select(&self, clause: &WhereClause, limit: Option<usize>) -> StoreResult<Vec<Record>> {
        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            self.select_list, self.table, clause.sql
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(clause.params.iter()), |row| self.row_to_record(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Insert statement for a validated record. A Null identity is left to
    /// the database.
    fn insert_statement(&self, record: &Record) -> StoreResult<(String, Vec<SqlValue>)> {
        let identity = self.schema.identity().map(|id| id.field.as_str());
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for (name, spec) in self.schema.fields() {
            let value = record.get(name).cloned().unwrap_or(Value::Null);
            if Some(name) == identity && value.is_null() {
                continue;
            }
            columns.push(quote_ident(name)?);
            values.push(self.codec.encode(&spec.field_type, &value));
        }

        let sql = if columns.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                self.table, self.select_list
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                self.table,
                columns.join(", "),
                vec!["?"; columns.len()].join(", "),
                self.select_list
            )
        };
        Ok((sql, values))
    }

    /// Maps unique and primary key violations to `UniqueViolation`.
    fn map_write_error(&self, err: rusqlite::Error, record: Option<&Record>) -> StoreError {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            let unique = failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY);
            if unique {
                // "UNIQUE constraint failed: <table>.<column>"
                let field = message
                    .as_deref()
                    .and_then(|m| m.rsplit('.').next())
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let value = record
                    .and_then(|r| r.get(&field))
                    .map(|v| v.to_text())
                    .unwrap_or_default();
                return StoreError::UniqueViolation { field, value };
            }
        }
        StoreError::Database(err)
    }

    fn identity_text(&self, record: &Record) -> String {
        self.schema
            .identity()
            .and_then(|id| record.get(&id.field))
            .map(|v| v.to_text())
            .unwrap_or_default()
    }

    // ==================
    // Backend extras
    // ==================

    /// Number of records matching `filter` (all records for an empty filter)
    pub fn count(&self, filter: &Filter) -> StoreResult<i64> {
        let clause = self.compile(filter)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table, clause.sql);
        let conn = self.pool.acquire()?;
        let count = conn.query_row(&sql, params_from_iter(clause.params.iter()), |row| row.get(0))?;
        Ok(count)
    }

    /// Validates every record, then inserts all of them in one transaction.
    /// Either every record is stored or none is.
    pub fn batch_insert(&self, records: &[Record]) -> StoreResult<Vec<Record>> {
        let validated = records
            .iter()
            .map(|r| self.schema.validate_and_fill(r, &self.codec, SequenceFill::Deferred))
            .collect::<Result<Vec<_>, _>>()?;
        if validated.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_guard();
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;

        let mut inserted = Vec::with_capacity(validated.len());
        for record in &validated {
            let (sql, values) = self.insert_statement(record)?;
            let stored = tx
                .query_row(&sql, params_from_iter(values.iter()), |row| self.row_to_record(row))
                .map_err(|e| self.map_write_error(e, Some(record)))?;
            inserted.push(stored);
        }
        tx.commit()?;

        let count = inserted.len().to_string();
        Logger::info(
            "STORE_INSERT",
            &[
                ("backend", BACKEND),
                ("count", &count),
                ("entity", self.schema.entity()),
            ],
        );
        Ok(inserted)
    }

    /// Runs arbitrary SQL with bound parameters.
    ///
    /// Statements that produce columns return their rows, decoded by
    /// storage class; other statements return the affected row count.
    /// Raw statements are serialized with the store's mutations.
    pub fn execute_raw(&self, sql: &str, params: &[Value]) -> StoreResult<RawResult> {
        let bound: Vec<SqlValue> = params
            .iter()
            .map(|v| self.codec.encode(&FieldType::Text, v))
            .collect();

        let _guard = self.write_guard();
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(sql)?;

        if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(bound.iter()))?;
            return Ok(RawResult {
                rows: Vec::new(),
                affected,
            });
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params_from_iter(bound.iter()), |row| {
                names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Ok((name.clone(), SqlCodec::raw(row.get(i)?))))
                    .collect::<rusqlite::Result<Record>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawResult { rows, affected: 0 })
    }

    /// Columns, indexes and row count of this store's table
    pub fn get_table_info(&self) -> StoreResult<TableInfo> {
        let conn = self.pool.acquire()?;
        read_table_info(&conn, self.schema.entity())
    }

    /// Closes the pool. Later operations fail with `StoreError::Closed`.
    pub fn close(&self) {
        self.pool.close();
    }
}

impl RecordStore for RelationalStore {
    fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        self.select(&WhereClause::default(), None)
    }

    fn find(&self, filter: &Filter) -> StoreResult<Vec<Record>> {
        let clause = self.compile(filter)?;
        self.select(&clause, None)
    }

    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Record>> {
        let clause = self.compile(filter)?;
        Ok(self.select(&clause, Some(1))?.into_iter().next())
    }

    fn insert(&self, data: &Record) -> StoreResult<Record> {
        let record = self
            .schema
            .validate_and_fill(data, &self.codec, SequenceFill::Deferred)?;
        let (sql, values) = self.insert_statement(&record)?;

        let stored = {
            let _guard = self.write_guard();
            let conn = self.pool.acquire()?;
            conn.query_row(&sql, params_from_iter(values.iter()), |row| self.row_to_record(row))
                .map_err(|e| self.map_write_error(e, Some(&record)))?
        };

        let id = self.identity_text(&stored);
        Logger::info(
            "STORE_INSERT",
            &[
                ("backend", BACKEND),
                ("entity", self.schema.entity()),
                ("id", &id),
            ],
        );
        Ok(stored)
    }

    fn update(&self, filter: &Filter, changes: &Record) -> StoreResult<bool> {
        let clause = self.compile(filter)?;
        let prepared = self.schema.prepare_changes(changes);

        if prepared.is_empty() {
            return Ok(self.count(filter)? > 0);
        }

        let mut assignments = Vec::with_capacity(prepared.len());
        let mut params = Vec::with_capacity(prepared.len() + clause.params.len());
        for (name, value) in prepared.iter() {
            let field_type = self
                .schema
                .field(name)
                .map(|s| s.field_type)
                .unwrap_or(FieldType::Text);
            assignments.push(format!("{} = ?", quote_ident(name)?));
            params.push(self.codec.encode(&field_type, value));
        }
        params.extend(clause.params.iter().cloned());

        let sql = format!(
            "UPDATE {} SET {}{}",
            self.table,
            assignments.join(", "),
            clause.sql
        );

        let affected = {
            let _guard = self.write_guard();
            let conn = self.pool.acquire()?;
            conn.execute(&sql, params_from_iter(params.iter()))
                .map_err(|e| self.map_write_error(e, Some(&prepared)))?
        };

        if affected > 0 {
            let count = affected.to_string();
            Logger::info(
                "STORE_UPDATE",
                &[
                    ("backend", BACKEND),
                    ("entity", self.schema.entity()),
                    ("matched", &count),
                ],
            );
        }
        Ok(affected > 0)
    }

    fn delete(&self, filter: &Filter) -> StoreResult<bool> {
        let clause = self.compile(filter)?;
        let sql = format!("DELETE FROM {}{}", self.table, clause.sql);

        let affected = {
            let _guard = self.write_guard();
            let conn = self.pool.acquire()?;
            conn.execute(&sql, params_from_iter(clause.params.iter()))?
        };

        if affected > 0 {
            let count = affected.to_string();
            Logger::info(
                "STORE_DELETE",
                &[
                    ("backend", BACKEND),
                    ("entity", self.schema.entity()),
                    ("removed", &count),
                ],
            );
        }
        Ok(affected > 0)
    }
}

impl std::fmt::Debug for RelationalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalStore")
            .field("table", &self.table)
            .field("identity_policy", &self.identity_policy)
            .finish()
    }
}
