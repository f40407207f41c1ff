//! Domain types for cluster topology and stored document metadata.
//!
//! These mirror the rows of the management database (`configs`, `nodes`,
//! `namespaces`, `shards`) after decoding, plus the `meta` column of a
//! document row.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Primary key of a row in the `nodes` table.
pub type NodeId = i64;

/// Namespace that wildcard ids and the `game` bucket are redirected to.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Namespace segment that means "any namespace".
pub const WILDCARD_NAMESPACE: &str = "*";

/// Bucket whose documents always live in the global namespace.
pub const GAME_BUCKET: &str = "game";

/// Config key holding the per-shard database name prefix.
pub const DB_PREFIX_KEY: &str = "db_prefix";

// ── Status ─────────────────────────────────────────────────────────

/// Availability status of a node or a shard assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum NodeStatus {
    Active,
    Inactive,
    /// Any other value the management database holds.
    Other(String),
}

impl NodeStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, NodeStatus::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Inactive => "inactive",
            NodeStatus::Other(s) => s,
        }
    }
}

impl From<&str> for NodeStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => NodeStatus::Active,
            "inactive" => NodeStatus::Inactive,
            other => NodeStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeStatus {
    fn from(s: String) -> Self {
        NodeStatus::from(s.as_str())
    }
}

impl From<NodeStatus> for String {
    fn from(status: NodeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Topology ───────────────────────────────────────────────────────

/// A logical partition of the keyspace with its own shard count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub numshards: NonZeroU32,
    /// Creation timestamp as reported by the management database.
    pub created: Option<String>,
}

/// A physical database server hosting shard databases.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub status: NodeStatus,
    pub weight: i64,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("status", &self.status)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A row of the `shards` table: which node owns `(shard, namespace)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub shard: u32,
    pub namespace: String,
    pub node_id: NodeId,
    /// Recorded separately from the node's own status; both must be active.
    pub status: NodeStatus,
}

/// Database holding one shard of a namespace: `{prefix}_{namespace}_{shard}_data`.
pub fn shard_database_name(db_prefix: &str, namespace: &str, shard: u32) -> String {
    format!("{db_prefix}_{namespace}_{shard}_data")
}

// ── Document meta ──────────────────────────────────────────────────

/// The parsed `meta` column of a document row.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub compression: bool,
    /// The full meta object, including fields the browser does not interpret.
    pub raw: Value,
}

impl DocumentMeta {
    /// Parse the `meta` JSON text. The `compression` flag is required;
    /// numeric flags are read by truthiness.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let raw: Value =
            serde_json::from_str(text).map_err(|e| CoreError::InvalidMeta(e.to_string()))?;
        let compression = match raw.get("compression") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(other) => {
                return Err(CoreError::InvalidMeta(format!(
                    "compression flag must be a boolean, got {other}"
                )));
            }
            None => {
                return Err(CoreError::InvalidMeta(
                    "missing compression flag".to_string(),
                ));
            }
        };
        Ok(Self { compression, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!(NodeStatus::from("active"), NodeStatus::Active);
        assert_eq!(NodeStatus::from("inactive"), NodeStatus::Inactive);
        assert_eq!(
            NodeStatus::from("draining"),
            NodeStatus::Other("draining".to_string())
        );
        assert_eq!(NodeStatus::from("draining").to_string(), "draining");
        assert!(NodeStatus::Active.is_active());
        assert!(!NodeStatus::from("ACTIVE").is_active());
    }

    #[test]
    fn database_name_layout() {
        assert_eq!(shard_database_name("janus", "148", 51), "janus_148_51_data");
    }

    #[test]
    fn meta_compression_flag() {
        assert!(DocumentMeta::parse(r#"{"compression":true}"#).unwrap().compression);
        assert!(!DocumentMeta::parse(r#"{"compression":false,"v":2}"#).unwrap().compression);
        assert!(DocumentMeta::parse(r#"{"compression":1}"#).unwrap().compression);
        assert!(!DocumentMeta::parse(r#"{"compression":0}"#).unwrap().compression);
    }

    #[test]
    fn meta_rejects_missing_or_bad_flag() {
        assert!(matches!(
            DocumentMeta::parse("{}"),
            Err(CoreError::InvalidMeta(_))
        ));
        assert!(matches!(
            DocumentMeta::parse(r#"{"compression":"yes"}"#),
            Err(CoreError::InvalidMeta(_))
        ));
        assert!(matches!(
            DocumentMeta::parse("not json"),
            Err(CoreError::InvalidMeta(_))
        ));
    }

    #[test]
    fn node_debug_hides_password() {
        let node = Node {
            id: 1,
            host: "db1".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "secret".to_string(),
            status: NodeStatus::Active,
            weight: 1,
        };
        assert!(!format!("{node:?}").contains("secret"));
        assert!(!serde_json::to_string(&node).unwrap().contains("secret"));
    }
}
