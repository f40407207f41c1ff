//! In-memory engine: databases of tables of rows.
//!
//! Behaves like a tiny transactional server: selects see committed data,
//! updates are buffered per connection and applied on `commit()`, and closing
//! without committing discards them. Every connect attempt, commit, and close
//! is recorded so tests can assert on connection behaviour.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{ConnectErrorKind, SqlError, SqlResult};
use crate::statement::{Select, Update};
use crate::value::Row;
use crate::{ConnectTarget, Connection, Connector};

type Tables = HashMap<String, Vec<Row>>;

#[derive(Debug, Default)]
struct MemoryState {
    databases: HashMap<String, Tables>,
    refused_hosts: HashSet<String>,
    failing_tables: HashSet<String>,
    connects: Vec<ConnectTarget>,
    commits: usize,
    closes: usize,
}

/// Shared handle to an in-memory server. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory state lock")
    }

    /// Create an empty table (and its database) if absent.
    pub fn create_table(&self, database: &str, table: &str) {
        self.state()
            .databases
            .entry(database.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default();
    }

    /// Append a row, creating the table if needed.
    pub fn insert_row(&self, database: &str, table: &str, row: Row) {
        self.state()
            .databases
            .entry(database.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Committed rows of a table (empty if the table does not exist).
    pub fn rows(&self, database: &str, table: &str) -> Vec<Row> {
        self.state()
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
            .unwrap_or_default()
    }

    /// Make every connect to `host` fail with a network error.
    pub fn refuse_host(&self, host: &str) {
        self.state().refused_hosts.insert(host.to_string());
    }

    /// Make every update against `table` fail with an execute error.
    pub fn fail_updates_on(&self, table: &str) {
        self.state().failing_tables.insert(table.to_string());
    }

    /// Every target a connect was attempted against, in order.
    pub fn connects(&self) -> Vec<ConnectTarget> {
        self.state().connects.clone()
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, target: &ConnectTarget) -> SqlResult<Box<dyn Connection>> {
        let mut state = self.state();
        state.connects.push(target.clone());

        if state.refused_hosts.contains(&target.host) {
            return Err(SqlError::Connect {
                target: target.to_string(),
                kind: ConnectErrorKind::Network,
                message: "connection refused".to_string(),
            });
        }
        if !state.databases.contains_key(&target.database) {
            return Err(SqlError::Connect {
                target: target.to_string(),
                kind: ConnectErrorKind::Other,
                message: format!("unknown database '{}'", target.database),
            });
        }

        debug!(target = %target, "memory connection opened");
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            database: target.database.clone(),
            pending: Vec::new(),
            closed: false,
        }))
    }
}

/// One connection to a [`MemoryConnector`] database.
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    database: String,
    pending: Vec<Update>,
    closed: bool,
}

impl MemoryConnection {
    fn check_open(&self) -> SqlResult<()> {
        if self.closed {
            return Err(SqlError::Query("connection already closed".to_string()));
        }
        Ok(())
    }
}

fn project(row: &Row, columns: &[String]) -> SqlResult<Row> {
    if columns.is_empty() {
        return Ok(row.clone());
    }
    columns
        .iter()
        .map(|column| {
            row.get(column)
                .cloned()
                .map(|value| (column.clone(), value))
                .ok_or_else(|| SqlError::Query(format!("unknown column '{column}'")))
        })
        .collect()
}

impl Connection for MemoryConnection {
    fn query(&mut self, select: &Select) -> SqlResult<Vec<Row>> {
        self.check_open()?;
        let state = self.state.lock().expect("memory state lock");
        let rows = state
            .databases
            .get(&self.database)
            .and_then(|tables| tables.get(&select.table))
            .ok_or_else(|| {
                SqlError::Query(format!(
                    "table '{}.{}' doesn't exist",
                    self.database, select.table
                ))
            })?;

        let limit = select.limit.map_or(usize::MAX, |l| l as usize);
        rows.iter()
            .filter(|row| select.filters.iter().all(|f| f.matches(row)))
            .take(limit)
            .map(|row| project(row, &select.columns))
            .collect()
    }

    fn update(&mut self, update: &Update) -> SqlResult<u64> {
        self.check_open()?;
        let state = self.state.lock().expect("memory state lock");
        let rows = state
            .databases
            .get(&self.database)
            .and_then(|tables| tables.get(&update.table))
            .ok_or_else(|| {
                SqlError::Execute(format!(
                    "table '{}.{}' doesn't exist",
                    self.database, update.table
                ))
            })?;
        if state.failing_tables.contains(&update.table) {
            return Err(SqlError::Execute(format!(
                "lock wait timeout exceeded on '{}.{}'",
                self.database, update.table
            )));
        }
        // Like MySQL without CLIENT_FOUND_ROWS: only rows that change count.
        let affected = rows
            .iter()
            .filter(|row| update.filters.iter().all(|f| f.matches(row)))
            .filter(|row| {
                update
                    .assignments
                    .iter()
                    .any(|(column, value)| row.get(column) != Some(value))
            })
            .count() as u64;
        drop(state);

        self.pending.push(update.clone());
        Ok(affected)
    }

    fn commit(&mut self) -> SqlResult<()> {
        self.check_open()?;
        let mut state = self.state.lock().expect("memory state lock");
        for update in self.pending.drain(..) {
            let Some(rows) = state
                .databases
                .get_mut(&self.database)
                .and_then(|tables| tables.get_mut(&update.table))
            else {
                return Err(SqlError::Commit(format!("table '{}' vanished", update.table)));
            };
            for row in rows
                .iter_mut()
                .filter(|row| update.filters.iter().all(|f| f.matches(row)))
            {
                for (column, value) in &update.assignments {
                    if !row.set(column, value.clone()) {
                        row.push(column, value.clone());
                    }
                }
            }
        }
        state.commits += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        self.state.lock().expect("memory state lock").closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    fn seeded() -> MemoryConnector {
        let connector = MemoryConnector::new();
        connector.insert_row(
            "shard",
            "data_account",
            Row::new().with("docid", "g:account:1").with("document", "one"),
        );
        connector.insert_row(
            "shard",
            "data_account",
            Row::new().with("docid", "g:account:2").with("document", "two"),
        );
        connector
    }

    fn open(connector: &MemoryConnector) -> Box<dyn Connection> {
        connector
            .connect(&ConnectTarget::new("db1", 3306, "shard"))
            .unwrap()
    }

    #[test]
    fn select_filters_projects_and_limits() {
        let connector = seeded();
        let mut conn = open(&connector);

        let rows = conn
            .query(
                &Select::from("data_account")
                    .columns(&["document"])
                    .filter_eq("docid", "g:account:2"),
            )
            .unwrap();
        assert_eq!(rows, vec![Row::new().with("document", "two")]);

        let limited = conn.query(&Select::from("data_account").limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn select_unknown_table_or_column_fails() {
        let connector = seeded();
        let mut conn = open(&connector);
        assert!(matches!(
            conn.query(&Select::from("data_missing")),
            Err(SqlError::Query(_))
        ));
        assert!(matches!(
            conn.query(&Select::from("data_account").columns(&["nope"])),
            Err(SqlError::Query(_))
        ));
    }

    #[test]
    fn updates_apply_on_commit_only() {
        let connector = seeded();
        let mut conn = open(&connector);
        let update = Update::table("data_account")
            .set("document", "uno")
            .filter_eq("docid", "g:account:1");

        assert_eq!(conn.update(&update).unwrap(), 1);
        assert_eq!(
            connector.rows("shard", "data_account")[0].get("document"),
            Some(&SqlValue::from("one"))
        );

        conn.commit().unwrap();
        assert_eq!(
            connector.rows("shard", "data_account")[0].get("document"),
            Some(&SqlValue::from("uno"))
        );
        assert_eq!(connector.commits(), 1);
    }

    #[test]
    fn close_discards_uncommitted_updates() {
        let connector = seeded();
        let mut conn = open(&connector);
        conn.update(&Update::table("data_account").set("document", "lost"))
            .unwrap();
        conn.close();
        conn.close();

        assert_eq!(connector.closes(), 1);
        assert_eq!(
            connector.rows("shard", "data_account")[1].get("document"),
            Some(&SqlValue::from("two"))
        );
    }

    #[test]
    fn update_matching_nothing_reports_zero() {
        let connector = seeded();
        let mut conn = open(&connector);
        let affected = conn
            .update(
                &Update::table("data_account")
                    .set("document", "x")
                    .filter_eq("docid", "g:account:404"),
            )
            .unwrap();
        assert_eq!(affected, 0);
        assert!(matches!(
            conn.update(&Update::table("data_missing").set("document", "x")),
            Err(SqlError::Execute(_))
        ));
    }

    #[test]
    fn update_to_same_value_reports_zero() {
        let connector = seeded();
        let mut conn = open(&connector);
        let affected = conn
            .update(
                &Update::table("data_account")
                    .set("document", "one")
                    .filter_eq("docid", "g:account:1"),
            )
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[test]
    fn failing_table_rejects_updates() {
        let connector = seeded();
        connector.fail_updates_on("data_account");
        let mut conn = open(&connector);

        assert!(matches!(
            conn.update(&Update::table("data_account").set("document", "x")),
            Err(SqlError::Execute(_))
        ));
        assert_eq!(conn.query(&Select::from("data_account")).unwrap().len(), 2);
        conn.commit().unwrap();
        assert_eq!(
            connector.rows("shard", "data_account")[0].get("document"),
            Some(&SqlValue::from("one"))
        );
    }

    #[test]
    fn connect_failures() {
        let connector = seeded();
        let unknown_db = connector
            .connect(&ConnectTarget::new("db1", 3306, "nope"))
            .unwrap_err();
        assert_eq!(unknown_db.connect_kind(), Some(ConnectErrorKind::Other));

        connector.refuse_host("db2");
        let refused = connector
            .connect(&ConnectTarget::new("db2", 3306, "shard"))
            .unwrap_err();
        assert_eq!(refused.connect_kind(), Some(ConnectErrorKind::Network));
        assert_eq!(connector.connects().len(), 2);
    }
}
