//! DocumentAccessor: reads and rewrites one document row on its node.
//!
//! Reads open the node connection, fetch the row, and close the connection
//! before any payload work. Writes keep the connection for the update and
//! commit. Both are gated on the node being active before any connection is
//! attempted (reads only when the session's policy refuses inactive nodes).

use std::time::Duration;

use illdb_core::codec::{self, SizedPayload};
use illdb_core::{DocumentMeta, InactiveReadPolicy};
use illdb_sql::{ConnectionRegistry, Row, ScopedConnection, Select, SqlValue, Update};
use tracing::{info, warn};

use crate::error::{ShardError, ShardResult};
use crate::router::Location;

/// Columns selected from a `data_{type}` table.
pub const DOCUMENT_COLUMNS: [&str; 8] = [
    "_id", "docid", "document", "created", "modified", "cas", "expired", "meta",
];

/// A fetched document row.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRow {
    pub id: SqlValue,
    pub docid: String,
    /// Stored payload, compressed when `meta.compression` is set.
    pub document: Vec<u8>,
    pub created: SqlValue,
    pub modified: SqlValue,
    pub cas: SqlValue,
    pub expired: SqlValue,
    pub meta: DocumentMeta,
}

impl DocumentRow {
    fn from_row(row: &Row) -> ShardResult<Self> {
        let column = |name: &str| row.get(name).cloned().unwrap_or(SqlValue::Null);
        let meta_text = row
            .get("meta")
            .and_then(SqlValue::as_str)
            .ok_or_else(|| ShardError::InvalidMeta("meta column is empty".to_string()))?;
        Ok(Self {
            id: column("_id"),
            docid: row
                .get("docid")
                .and_then(SqlValue::as_str)
                .unwrap_or_default()
                .to_string(),
            document: row
                .get("document")
                .and_then(SqlValue::as_bytes)
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            created: column("created"),
            modified: column("modified"),
            cas: column("cas"),
            expired: column("expired"),
            meta: DocumentMeta::parse(meta_text)?,
        })
    }

    /// The payload as the application sees it.
    pub fn payload(&self) -> ShardResult<Vec<u8>> {
        if self.meta.compression {
            Ok(codec::decompress(&self.document)?)
        } else {
            Ok(self.document.clone())
        }
    }
}

/// Result of a successful `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOutcome {
    pub size: u64,
    pub compressed: bool,
    pub rows_affected: u64,
}

/// Performs `get`/`set` against resolved locations.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAccessor<'r> {
    registry: &'r ConnectionRegistry,
    connect_timeout: Duration,
    inactive_reads: InactiveReadPolicy,
}

impl<'r> DocumentAccessor<'r> {
    pub fn new(
        registry: &'r ConnectionRegistry,
        connect_timeout: Duration,
        inactive_reads: InactiveReadPolicy,
    ) -> Self {
        Self {
            registry,
            connect_timeout,
            inactive_reads,
        }
    }

    fn open(&self, location: &Location) -> ShardResult<ScopedConnection<'r>> {
        self.registry
            .open(&location.connect_target(self.connect_timeout))
            .map_err(ShardError::Connection)
    }

    fn fetch(conn: &ScopedConnection<'_>, location: &Location) -> ShardResult<DocumentRow> {
        let select = Select::from(&location.table)
            .columns(&DOCUMENT_COLUMNS)
            .filter_eq("docid", location.docid.as_str())
            .limit(1);
        let row = conn
            .query_one(&select)?
            .ok_or_else(|| ShardError::DocumentNotFound(location.docid.clone()))?;
        DocumentRow::from_row(&row)
    }

    /// Fetch the stored row as-is.
    pub fn fetch_row(&self, location: &Location) -> ShardResult<DocumentRow> {
        match self.inactive_reads {
            InactiveReadPolicy::Refuse => location.ensure_active()?,
            InactiveReadPolicy::Allow if !location.is_active() => warn!(
                node = location.node.id,
                node_status = %location.node.status,
                shard_status = %location.shard_status,
                "reading from inactive node"
            ),
            InactiveReadPolicy::Allow => {}
        }
        let conn = self.open(location)?;
        let row = Self::fetch(&conn, location)?;
        conn.close();
        Ok(row)
    }

    /// Read a document, decompressing it if the row says so.
    pub fn get(&self, location: &Location) -> ShardResult<Vec<u8>> {
        self.fetch_row(location)?.payload()
    }

    /// Replace a document's payload with a size-corrected `payload`,
    /// compressed to match the existing row.
    pub fn set(&self, location: &Location, payload: &str) -> ShardResult<SetOutcome> {
        location.ensure_active()?;
        let conn = self.open(location)?;
        let existing = Self::fetch(&conn, location)?;

        let SizedPayload { json, size } = codec::correct_size(payload)?;
        let compressed = existing.meta.compression;
        let stored = if compressed {
            SqlValue::Bytes(codec::compress(json.as_bytes())?)
        } else {
            SqlValue::Text(json)
        };

        let update = Update::table(&location.table)
            .set("document", stored)
            .filter_eq("docid", location.docid.as_str());
        let failed = |source| ShardError::UpdateFailed {
            docid: location.docid.clone(),
            source,
        };
        let rows_affected = conn.update(&update).map_err(failed)?;
        if rows_affected == 0 {
            info!(docid = %location.docid, "no row was updated, it may no longer exist");
        }
        conn.commit().map_err(failed)?;
        conn.close();

        Ok(SetOutcome {
            size,
            compressed,
            rows_affected,
        })
    }
}
