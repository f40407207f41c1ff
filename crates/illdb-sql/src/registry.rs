//! ConnectionRegistry: tracks live connections and guarantees release.
//!
//! # Lifecycle
//!
//! ```text
//! registry.open(target)
//!   → Connector::connect(target)      (fails → SqlError::Connect, nothing tracked)
//!   → handle allocated, connection tracked
//!   → ScopedConnection returned
//!
//! ScopedConnection dropped (any exit path)
//!   → registry.close(handle)          (idempotent)
//!     → Connection::close(), untracked
//! ```
//!
//! Statements pass through the registry so `--show-sql` can log them in one
//! place.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{SqlError, SqlResult};
use crate::statement::{Select, Update};
use crate::value::{Row, SqlValue};
use crate::{ConnectTarget, Connection, Connector};

/// A tracked connection and the label it was opened under.
#[derive(Debug)]
struct LiveConnection {
    label: String,
    conn: Box<dyn Connection>,
}

/// Owns every connection opened during a browser session.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    live: Mutex<HashMap<u64, LiveConnection>>,
    next_handle: AtomicU64,
    show_sql: bool,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            live: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            show_sql: false,
        }
    }

    /// Builder method: log every statement at `info` instead of `debug`.
    pub fn with_show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    /// Open a connection and track it until the returned guard is dropped.
    pub fn open(&self, target: &ConnectTarget) -> SqlResult<ScopedConnection<'_>> {
        let conn = self.connector.connect(target)?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let label = target.to_string();
        debug!(handle, target = %label, "connection opened");
        self.live
            .lock()
            .expect("connections lock")
            .insert(handle, LiveConnection { label, conn });
        Ok(ScopedConnection {
            registry: self,
            handle,
        })
    }

    /// Close and untrack a connection. Unknown handles are ignored.
    /// Returns whether the handle was live.
    pub fn close(&self, handle: u64) -> bool {
        let removed = self.live.lock().expect("connections lock").remove(&handle);
        match removed {
            Some(mut live) => {
                live.conn.close();
                debug!(handle, target = %live.label, "connection closed");
                true
            }
            None => false,
        }
    }

    /// Number of connections currently tracked.
    pub fn live_count(&self) -> usize {
        self.live.lock().expect("connections lock").len()
    }

    /// Close every tracked connection.
    pub fn close_all(&self) {
        let drained: Vec<(u64, LiveConnection)> = self
            .live
            .lock()
            .expect("connections lock")
            .drain()
            .collect();
        for (handle, mut live) in drained {
            live.conn.close();
            debug!(handle, target = %live.label, "connection closed");
        }
    }

    /// Parameter values carry document payloads, so only their count is logged.
    fn log_statement(&self, handle: u64, sql: &str, params: &[SqlValue]) {
        let params = params.len();
        if self.show_sql {
            info!(target: "illdb::sql", handle, %sql, params, "sql");
        } else {
            debug!(target: "illdb::sql", handle, %sql, params, "sql");
        }
    }

    fn with_live<T>(
        &self,
        handle: u64,
        f: impl FnOnce(&mut dyn Connection) -> SqlResult<T>,
    ) -> SqlResult<T> {
        let mut live = self.live.lock().expect("connections lock");
        let entry = live.get_mut(&handle).ok_or(SqlError::Closed(handle))?;
        f(entry.conn.as_mut())
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("live", &self.live_count())
            .field("show_sql", &self.show_sql)
            .finish_non_exhaustive()
    }
}

/// Guard over one tracked connection; closes it when dropped.
#[derive(Debug)]
pub struct ScopedConnection<'a> {
    registry: &'a ConnectionRegistry,
    handle: u64,
}

impl ScopedConnection<'_> {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn query(&self, select: &Select) -> SqlResult<Vec<Row>> {
        let (sql, params) = select.to_sql();
        self.registry.log_statement(self.handle, &sql, &params);
        self.registry.with_live(self.handle, |conn| conn.query(select))
    }

    /// Run a select expected to match at most one row.
    pub fn query_one(&self, select: &Select) -> SqlResult<Option<Row>> {
        Ok(self.query(select)?.into_iter().next())
    }

    pub fn update(&self, update: &Update) -> SqlResult<u64> {
        let (sql, params) = update.to_sql();
        self.registry.log_statement(self.handle, &sql, &params);
        self.registry.with_live(self.handle, |conn| conn.update(update))
    }

    pub fn commit(&self) -> SqlResult<()> {
        self.registry.log_statement(self.handle, "COMMIT", &[]);
        self.registry.with_live(self.handle, |conn| conn.commit())
    }

    /// Close now instead of at end of scope.
    pub fn close(self) {
        // Drop does the work.
    }
}

impl Drop for ScopedConnection<'_> {
    fn drop(&mut self) {
        self.registry.close(self.handle);
    }
}
