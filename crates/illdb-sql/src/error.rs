//! Error types for the relational engine seam.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// Why a connection attempt failed, when the driver tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    Auth,
    Network,
    Timeout,
    Other,
}

impl fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectErrorKind::Auth => write!(f, "authentication"),
            ConnectErrorKind::Network => write!(f, "network"),
            ConnectErrorKind::Timeout => write!(f, "timeout"),
            ConnectErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Errors raised by connectors and connections.
#[derive(Debug, Error)]
pub enum SqlError {
    #[error("cannot connect to {target} ({kind}): {message}")]
    Connect {
        target: String,
        kind: ConnectErrorKind,
        message: String,
    },

    #[error("query failed: {0}")]
    Query(String),

    #[error("statement failed: {0}")]
    Execute(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("cannot decode column {column}: {message}")]
    Decode { column: String, message: String },

    #[error("connection {0} is closed")]
    Closed(u64),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl SqlError {
    /// The connect failure kind, if this is a connect error.
    pub fn connect_kind(&self) -> Option<ConnectErrorKind> {
        match self {
            SqlError::Connect { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
