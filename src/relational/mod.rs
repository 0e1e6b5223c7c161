//! Relational backend
//!
//! The record store contract over SQLite (via `rusqlite`), with a bounded
//! connection pool, typed comparison operators and table introspection.

mod codec;
mod ddl;
mod info;
mod pool;
mod store;

pub use codec::SqlCodec;
pub use ddl::{column_type, create_table_sql, index_statements, quote_ident, IndexStatement};
pub use info::{ColumnInfo, IndexInfo, TableInfo};
pub use pool::{ConnectionPool, PooledConnection};
pub use store::{RawResult, RelationalStore};
