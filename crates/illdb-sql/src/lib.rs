//! illdb-sql: the relational engine seam.
//!
//! Everything above this crate talks to databases through two small
//! synchronous traits: a [`Connector`] opens a [`Connection`] for a
//! [`ConnectTarget`], and a connection runs structured [`Select`] and
//! [`Update`] statements. Statements render to parameterized SQL with `?`
//! placeholders, so no caller ever interpolates values into SQL text.
//!
//! # Backends
//!
//! ```text
//! MySqlConnector   sqlx MySQL driver on a current-thread tokio runtime
//! MemoryConnector  databases → tables → rows held in memory (tests)
//! ```
//!
//! Live connections are tracked by a [`ConnectionRegistry`], which hands
//! out [`ScopedConnection`] guards that close themselves when dropped.

pub mod error;
pub mod memory;
pub mod mysql;
pub mod registry;
pub mod statement;
pub mod value;

use std::fmt;
use std::time::Duration;

pub use error::{ConnectErrorKind, SqlError, SqlResult};
pub use memory::MemoryConnector;
pub use mysql::MySqlConnector;
pub use registry::{ConnectionRegistry, ScopedConnection};
pub use statement::{Filter, Select, Update};
pub use value::{Row, SqlValue};

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub timeout: Duration,
}

impl ConnectTarget {
    pub fn new(host: &str, port: u16, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: None,
            password: None,
            database: database.to_string(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Builder method: set login credentials.
    pub fn with_credentials(self, username: Option<&str>, password: Option<&str>) -> Self {
        Self {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            ..self
        }
    }

    /// Builder method: set the connect timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.username {
            write!(f, "{user}@")?;
        }
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// An open connection to one database.
pub trait Connection: Send + fmt::Debug {
    /// Run a select and return every matching row.
    fn query(&mut self, select: &Select) -> SqlResult<Vec<Row>>;
    /// Run an update inside the connection's transaction. Returns affected rows.
    fn update(&mut self, update: &Update) -> SqlResult<u64>;
    /// Commit the pending transaction, if any.
    fn commit(&mut self) -> SqlResult<()>;
    /// Release the connection. Uncommitted changes are discarded.
    fn close(&mut self);
}

/// Opens connections. Injected so the routing layer can run without MySQL.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &ConnectTarget) -> SqlResult<Box<dyn Connection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_display_and_debug() {
        let target = ConnectTarget::new("db1", 3306, "janus_global_1_data")
            .with_credentials(Some("root"), Some("hunter2"));
        assert_eq!(target.to_string(), "root@db1:3306/janus_global_1_data");
        assert!(!format!("{target:?}").contains("hunter2"));
    }

    #[test]
    fn target_builder() {
        let target = ConnectTarget::new("db1", 3306, "mgmt").with_timeout(Duration::from_secs(3));
        assert_eq!(target.timeout, Duration::from_secs(3));
        assert!(target.username.is_none());
        assert_eq!(target.to_string(), "db1:3306/mgmt");
    }
}
