//! Bounded SQLite connection pool
//!
//! Opens `min_connections` up front and grows on demand to
//! `max_connections`. When every connection is checked out, `acquire`
//! blocks until one is returned, or fails with `PoolExhausted` once the
//! configured acquire timeout elapses. Connections go back to the pool when
//! the guard drops, on success and error paths alike.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags};

use crate::config::RelationalConfig;
use crate::observability::Logger;
use crate::store::{StoreError, StoreResult};

#[derive(Debug)]
struct PoolState {
    idle: Vec<Connection>,
    total: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct ConnectionPool {
    config: RelationalConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Opens one connection with the pool's pragmas applied.
fn open_connection(config: &RelationalConfig) -> StoreResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(&config.database_path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &RelationalConfig) -> StoreResult<()> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    // journal_mode returns the resulting mode as a row
    connection.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
    connection.execute_batch("PRAGMA case_sensitive_like = ON;")?;
    Ok(())
}

impl ConnectionPool {
    pub fn open(config: &RelationalConfig) -> StoreResult<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }

        let mut idle = Vec::with_capacity(config.max_connections);
        for _ in 0..config.min_connections {
            idle.push(open_connection(config)?);
        }

        let path = config.database_path.display().to_string();
        let min = config.min_connections.to_string();
        let max = config.max_connections.to_string();
        Logger::info(
            "POOL_INITIALIZED",
            &[("database", &path), ("max", &max), ("min", &min)],
        );

        Ok(Self {
            config: config.clone(),
            state: Mutex::new(PoolState {
                total: idle.len(),
                idle,
                closed: false,
            }),
            available: Condvar::new(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Checks out a connection for the duration of one logical operation.
    pub fn acquire(&self) -> StoreResult<PooledConnection<'_>> {
        let timeout = self.config.acquire_timeout_ms.map(Duration::from_millis);
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock_state();

        loop {
            if state.closed {
                return Err(StoreError::Closed);
            }
            if let Some(connection) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    connection: Some(connection),
                });
            }
            if state.total < self.config.max_connections {
                state.total += 1;
                drop(state);
                return match open_connection(&self.config) {
                    Ok(connection) => Ok(PooledConnection {
                        pool: self,
                        connection: Some(connection),
                    }),
                    Err(e) => {
                        self.lock_state().total -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }

            state = match deadline {
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StoreError::PoolExhausted(
                            self.config.acquire_timeout_ms.unwrap_or_default(),
                        ));
                    }
                    let (guard, _) = self
                        .available
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard
                }
            };
        }
    }

    fn release(&self, connection: Connection) {
        let mut state = self.lock_state();
        if state.closed {
            state.total -= 1;
            drop(state);
            drop(connection);
        } else {
            state.idle.push(connection);
        }
        self.available.notify_one();
    }

    /// Closes idle connections and refuses further checkouts. Connections
    /// still checked out close when returned.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        let idle = std::mem::take(&mut state.idle);
        state.total -= idle.len();
        drop(state);
        drop(idle);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// (idle, total) connection counts
    pub fn stats(&self) -> (usize, usize) {
        let state = self.lock_state();
        (state.idle.len(), state.total)
    }
}

/// A checked-out connection, returned to the pool on drop
#[derive(Debug)]
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    connection: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in drop
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
