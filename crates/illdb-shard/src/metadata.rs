//! MetadataStore: the management database's topology, loaded once.
//!
//! Each table is read with a single select and indexed by its primary key.
//! Keys are a [`MetaKey`]: one value for single-column keys, the ordered
//! tuple of values for composite keys. Typed views ([`Namespace`], [`Node`],
//! [`ShardAssignment`]) are decoded from the stored rows on lookup.

use std::collections::HashMap;
use std::num::NonZeroU32;

use illdb_core::{Namespace, Node, NodeStatus, ShardAssignment};
use illdb_sql::{Row, ScopedConnection, Select, SqlResult, SqlValue};
use tracing::debug;

use crate::error::{ShardError, ShardResult};

/// Primary key of a metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaKey {
    Single(SqlValue),
    Composite(Vec<SqlValue>),
}

impl MetaKey {
    /// Key for a single-column lookup.
    pub fn single(value: impl Into<SqlValue>) -> Self {
        MetaKey::Single(normalize(value.into()))
    }
}

/// Fold representation differences that the driver may surface for the
/// same logical key (unsigned vs signed ints, binary vs text strings).
fn normalize(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::UInt(v) => i64::try_from(v).map_or(SqlValue::UInt(v), SqlValue::Int),
        SqlValue::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        other => other,
    }
}

/// Shape of a metadata table: key columns first, then value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub key_columns: &'static [&'static str],
    pub value_columns: &'static [&'static str],
}

impl TableSpec {
    /// All selected columns in declared order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.key_columns
            .iter()
            .chain(self.value_columns)
            .copied()
            .collect()
    }

    /// Extract this table's primary key from a row.
    pub fn key_of(&self, row: &Row) -> ShardResult<MetaKey> {
        let mut parts = Vec::with_capacity(self.key_columns.len());
        for column in self.key_columns {
            let value = row.get(column).cloned().ok_or_else(|| ShardError::Topology {
                table: self.name.to_string(),
                message: format!("row has no key column {column}"),
            })?;
            parts.push(normalize(value));
        }
        Ok(match parts.len() {
            1 => MetaKey::Single(parts.remove(0)),
            _ => MetaKey::Composite(parts),
        })
    }

    pub fn select(&self) -> Select {
        Select::from(self.name).columns(&self.columns())
    }
}

/// Configuration key/value pairs.
pub const CONFIGS: TableSpec = TableSpec {
    name: "configs",
    key_columns: &["name"],
    value_columns: &["value"],
};

/// Database servers.
pub const NODES: TableSpec = TableSpec {
    name: "nodes",
    key_columns: &["id"],
    value_columns: &["host", "port", "username", "pwd", "status", "weight"],
};

/// Keyspace partitions and their shard counts.
pub const NAMESPACES: TableSpec = TableSpec {
    name: "namespaces",
    key_columns: &["name"],
    value_columns: &["numshards", "created"],
};

/// Shard-to-node assignments, keyed by `(id, namespace)`. Queried per
/// lookup rather than loaded.
pub const SHARDS: TableSpec = TableSpec {
    name: "shards",
    key_columns: &["id", "namespace"],
    value_columns: &["node", "status"],
};

/// One loaded table, indexed by primary key.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    rows: HashMap<MetaKey, Row>,
}

impl MetadataTable {
    /// Index already-fetched rows.
    pub fn from_rows(spec: TableSpec, rows: Vec<Row>) -> ShardResult<Self> {
        let mut indexed = HashMap::with_capacity(rows.len());
        for row in rows {
            indexed.insert(spec.key_of(&row)?, row);
        }
        Ok(Self { rows: indexed })
    }

    fn fetch(conn: &ScopedConnection<'_>, spec: TableSpec) -> SqlResult<Vec<Row>> {
        conn.query(&spec.select())
    }

    pub fn get(&self, key: &MetaKey) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Row decoding ───────────────────────────────────────────────────

fn topology(table: &str, message: String) -> ShardError {
    ShardError::Topology {
        table: table.to_string(),
        message,
    }
}

fn text(row: &Row, table: &str, column: &str) -> ShardResult<String> {
    match row.get(column) {
        Some(SqlValue::Null) | None => Ok(String::new()),
        Some(value) => value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| topology(table, format!("{column} is not text: {value}"))),
    }
}

fn int(row: &Row, table: &str, column: &str) -> ShardResult<i64> {
    let value = row
        .get(column)
        .ok_or_else(|| topology(table, format!("missing column {column}")))?;
    value
        .as_i64()
        .ok_or_else(|| topology(table, format!("{column} is not an integer: {value}")))
}

fn optional_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        SqlValue::Null => None,
        SqlValue::Int(v) => Some(v.to_string()),
        value => value.as_str().map(str::to_string),
    }
}

pub(crate) fn decode_namespace(row: &Row) -> ShardResult<Namespace> {
    let table = NAMESPACES.name;
    let numshards = int(row, table, "numshards")?;
    let numshards = u32::try_from(numshards)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| topology(table, format!("numshards must be at least 1, got {numshards}")))?;
    Ok(Namespace {
        name: text(row, table, "name")?,
        numshards,
        created: optional_text(row, "created"),
    })
}

pub(crate) fn decode_node(row: &Row) -> ShardResult<Node> {
    let table = NODES.name;
    let port = int(row, table, "port")?;
    let port = u16::try_from(port)
        .map_err(|_| topology(table, format!("port out of range: {port}")))?;
    let weight = match row.get("weight") {
        Some(SqlValue::Null) | None => 0,
        Some(_) => int(row, table, "weight")?,
    };
    Ok(Node {
        id: int(row, table, "id")?,
        host: text(row, table, "host")?,
        port,
        username: text(row, table, "username")?,
        password: text(row, table, "pwd")?,
        status: NodeStatus::from(text(row, table, "status")?),
        weight,
    })
}

pub(crate) fn decode_shard_assignment(row: &Row) -> ShardResult<ShardAssignment> {
    let table = SHARDS.name;
    let shard = int(row, table, "id")?;
    Ok(ShardAssignment {
        shard: u32::try_from(shard)
            .map_err(|_| topology(table, format!("shard id out of range: {shard}")))?,
        namespace: text(row, table, "namespace")?,
        node_id: int(row, table, "node")?,
        status: NodeStatus::from(text(row, table, "status")?),
    })
}

// ── Store ──────────────────────────────────────────────────────────

/// Read-only snapshot of the management tables.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    configs: MetadataTable,
    nodes: MetadataTable,
    namespaces: MetadataTable,
}

impl MetadataStore {
    /// Load `configs`, `nodes`, and `namespaces`. Any failure is a
    /// configuration error naming the bucket.
    pub fn load(conn: &ScopedConnection<'_>, bucket: &str) -> ShardResult<Self> {
        let fetch = |spec: TableSpec| {
            MetadataTable::fetch(conn, spec).map_err(|source| ShardError::Configuration {
                bucket: bucket.to_string(),
                source,
            })
        };
        let configs = MetadataTable::from_rows(CONFIGS, fetch(CONFIGS)?)?;
        let nodes = MetadataTable::from_rows(NODES, fetch(NODES)?)?;
        let namespaces = MetadataTable::from_rows(NAMESPACES, fetch(NAMESPACES)?)?;
        debug!(
            bucket,
            configs = configs.len(),
            nodes = nodes.len(),
            namespaces = namespaces.len(),
            "topology loaded"
        );
        Ok(Self {
            configs,
            nodes,
            namespaces,
        })
    }

    /// Build a store from already-indexed tables.
    pub fn from_tables(
        configs: MetadataTable,
        nodes: MetadataTable,
        namespaces: MetadataTable,
    ) -> Self {
        Self {
            configs,
            nodes,
            namespaces,
        }
    }

    /// Value of a config key.
    pub fn config(&self, name: &str) -> Option<&str> {
        self.configs
            .get(&MetaKey::single(name))?
            .get("value")?
            .as_str()
    }

    pub fn require_config(&self, name: &str) -> ShardResult<&str> {
        self.config(name)
            .ok_or_else(|| ShardError::MissingConfig(name.to_string()))
    }

    pub fn namespace(&self, name: &str) -> ShardResult<Option<Namespace>> {
        self.namespaces
            .get(&MetaKey::single(name))
            .map(decode_namespace)
            .transpose()
    }

    pub fn node(&self, id: i64) -> ShardResult<Option<Node>> {
        self.nodes
            .get(&MetaKey::single(id))
            .map(decode_node)
            .transpose()
    }
}
