//! MySQL backend on top of sqlx.
//!
//! sqlx is async; the browser is a strictly sequential tool. The connector
//! owns a current-thread tokio runtime and every connection bridges its
//! synchronous [`Connection`] methods onto it with `block_on`.
//!
//! Updates run inside an explicit transaction (`START TRANSACTION` before the
//! first update, `COMMIT` on [`Connection::commit`]); closing with a
//! transaction still open rolls it back.

use std::sync::Arc;

use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::types::chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Column, ConnectOptions, Connection as _, Executor, Row as _, TypeInfo};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::{ConnectErrorKind, SqlError, SqlResult};
use crate::statement::{Select, Update};
use crate::value::{Row, SqlValue};
use crate::{ConnectTarget, Connection, Connector};

/// SQLSTATE for "access denied".
const SQLSTATE_ACCESS_DENIED: &str = "28000";

/// Opens [`MySqlBackend`] connections.
pub struct MySqlConnector {
    runtime: Arc<Runtime>,
}

impl MySqlConnector {
    /// Create a connector with its own current-thread runtime.
    pub fn new() -> SqlResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl std::fmt::Debug for MySqlConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnector").finish_non_exhaustive()
    }
}

fn classify(err: &sqlx::Error) -> ConnectErrorKind {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => ConnectErrorKind::Network,
        sqlx::Error::PoolTimedOut => ConnectErrorKind::Timeout,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLSTATE_ACCESS_DENIED) => {
            ConnectErrorKind::Auth
        }
        _ => ConnectErrorKind::Other,
    }
}

impl Connector for MySqlConnector {
    fn connect(&self, target: &ConnectTarget) -> SqlResult<Box<dyn Connection>> {
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.database)
            .disable_statement_logging();
        if let Some(username) = &target.username {
            options = options.username(username);
        }
        if let Some(password) = &target.password {
            options = options.password(password);
        }

        let attempt = self
            .runtime
            .block_on(async { tokio::time::timeout(target.timeout, options.connect()).await });

        let conn = match attempt {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(SqlError::Connect {
                    target: target.to_string(),
                    kind: classify(&e),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(SqlError::Connect {
                    target: target.to_string(),
                    kind: ConnectErrorKind::Timeout,
                    message: format!("no connection within {:?}", target.timeout),
                });
            }
        };

        debug!(target = %target, "mysql connection established");
        Ok(Box::new(MySqlBackend {
            runtime: Arc::clone(&self.runtime),
            conn: Some(conn),
            in_transaction: false,
        }))
    }
}

/// A live sqlx MySQL connection.
pub struct MySqlBackend {
    runtime: Arc<Runtime>,
    conn: Option<MySqlConnection>,
    in_transaction: bool,
}

impl std::fmt::Debug for MySqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlBackend")
            .field("open", &self.conn.is_some())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::UInt(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    let value = match type_name {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)?
            .map(|b| SqlValue::Int(i64::from(b))),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int)
        }
        name if name.ends_with("UNSIGNED") => row
            .try_get::<Option<u64>, _>(index)?
            .map(|v| i64::try_from(v).map_or(SqlValue::UInt(v), SqlValue::Int)),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|v| SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            row.try_get::<Option<Vec<u8>>, _>(index)?.map(SqlValue::Bytes)
        }
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(SqlValue::Text),
            Err(_) => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
                .map(SqlValue::Bytes),
        },
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

fn decode_row(row: &MySqlRow) -> SqlResult<Row> {
    row.columns()
        .iter()
        .map(|column| {
            decode_column(row, column.ordinal(), column.type_info().name())
                .map(|value| (column.name().to_string(), value))
                .map_err(|e| SqlError::Decode {
                    column: column.name().to_string(),
                    message: e.to_string(),
                })
        })
        .collect()
}

impl Connection for MySqlBackend {
    fn query(&mut self, select: &Select) -> SqlResult<Vec<Row>> {
        let conn = self.conn.as_mut().ok_or(SqlError::Closed(0))?;
        let (sql, params) = select.to_sql();
        let rows = self
            .runtime
            .block_on(bind_all(sqlx::query(&sql), &params).fetch_all(&mut *conn))
            .map_err(|e| SqlError::Query(e.to_string()))?;
        rows.iter().map(decode_row).collect()
    }

    fn update(&mut self, update: &Update) -> SqlResult<u64> {
        let conn = self.conn.as_mut().ok_or(SqlError::Closed(0))?;
        if !self.in_transaction {
            self.runtime
                .block_on((&mut *conn).execute("START TRANSACTION"))
                .map_err(|e| SqlError::Execute(e.to_string()))?;
            self.in_transaction = true;
        }
        let (sql, params) = update.to_sql();
        let result = self
            .runtime
            .block_on(bind_all(sqlx::query(&sql), &params).execute(&mut *conn))
            .map_err(|e| SqlError::Execute(e.to_string()))?;
        Ok(result.rows_affected())
    }

    fn commit(&mut self) -> SqlResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        let conn = self.conn.as_mut().ok_or(SqlError::Closed(0))?;
        self.runtime
            .block_on((&mut *conn).execute("COMMIT"))
            .map_err(|e| SqlError::Commit(e.to_string()))?;
        self.in_transaction = false;
        Ok(())
    }

    fn close(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if self.in_transaction {
            if let Err(e) = self.runtime.block_on((&mut conn).execute("ROLLBACK")) {
                debug!(error = %e, "rollback on close failed");
            }
            self.in_transaction = false;
        }
        if let Err(e) = self.runtime.block_on(conn.close()) {
            debug!(error = %e, "mysql close failed");
        }
    }
}
