//! ShardRouter: from a document id to the node and table that hold it.
//!
//! ```text
//! "*:account:abc123"
//!   → namespace "*"           → "global" (wildcard, or bucket "game")
//!   → crc32(raw id) mod 4     → shard 1
//!   → shards(id=1, ns=global) → node 2, status active
//!   → janus_global_1_data.data_account on node 2
//! ```

use std::time::Duration;

use illdb_core::types::{GAME_BUCKET, GLOBAL_NAMESPACE, WILDCARD_NAMESPACE};
use illdb_core::{DB_PREFIX_KEY, DocumentId, Namespace, Node, ShardAssignment, shard_database_name};
use illdb_sql::{ConnectTarget, ScopedConnection};
use serde::Serialize;
use tracing::debug;

use crate::error::{ShardError, ShardResult};
use crate::metadata::{MetadataStore, SHARDS, decode_shard_assignment};

/// Name of the namespace a raw namespace segment resolves to.
pub fn effective_namespace<'a>(raw: &'a str, bucket: &str) -> &'a str {
    if raw == WILDCARD_NAMESPACE || bucket == GAME_BUCKET {
        GLOBAL_NAMESPACE
    } else {
        raw
    }
}

/// Where a document lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub docid: String,
    pub namespace: Namespace,
    pub shard: u32,
    pub database: String,
    pub table: String,
    pub node: Node,
    /// Status recorded on the shard assignment row.
    pub shard_status: illdb_core::NodeStatus,
}

impl Location {
    /// Both the node and its shard assignment must be active.
    pub fn is_active(&self) -> bool {
        self.node.status.is_active() && self.shard_status.is_active()
    }

    pub fn ensure_active(&self) -> ShardResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ShardError::NodeInactive {
                node_id: self.node.id,
                node_status: self.node.status.clone(),
                shard_status: self.shard_status.clone(),
            })
        }
    }

    /// Connection parameters for the shard database on the owning node.
    pub fn connect_target(&self, timeout: Duration) -> ConnectTarget {
        ConnectTarget::new(&self.node.host, self.node.port, &self.database)
            .with_credentials(Some(&self.node.username), Some(&self.node.password))
            .with_timeout(timeout)
    }
}

/// Resolves document ids against a loaded [`MetadataStore`].
#[derive(Debug, Clone, Copy)]
pub struct ShardRouter<'a> {
    metadata: &'a MetadataStore,
    bucket: &'a str,
}

impl<'a> ShardRouter<'a> {
    pub fn new(metadata: &'a MetadataStore, bucket: &'a str) -> Self {
        Self { metadata, bucket }
    }

    pub fn parse(raw: &str) -> ShardResult<DocumentId> {
        Ok(DocumentId::parse(raw)?)
    }

    /// Look up the namespace for a raw namespace segment.
    pub fn resolve_namespace(&self, raw: &str) -> ShardResult<Namespace> {
        let name = effective_namespace(raw, self.bucket);
        self.metadata
            .namespace(name)?
            .ok_or_else(|| ShardError::UnknownNamespace(name.to_string()))
    }

    pub fn shard_index(docid: &DocumentId, namespace: &Namespace) -> u32 {
        docid.shard_index(namespace.numshards)
    }

    /// Query the `shards` table for the assignment of `(shard, namespace)`.
    pub fn resolve_node(
        &self,
        management: &ScopedConnection<'_>,
        namespace: &Namespace,
        shard: u32,
    ) -> ShardResult<ShardAssignment> {
        let select = SHARDS
            .select()
            .filter_eq("id", shard)
            .filter_eq("namespace", namespace.name.as_str())
            .limit(1);
        let row = management
            .query_one(&select)?
            .ok_or_else(|| ShardError::ShardNotFound {
                namespace: namespace.name.clone(),
                shard,
            })?;
        decode_shard_assignment(&row)
    }

    pub fn database_name(&self, namespace: &Namespace, shard: u32) -> ShardResult<String> {
        let prefix = self.metadata.require_config(DB_PREFIX_KEY)?;
        Ok(shard_database_name(prefix, &namespace.name, shard))
    }

    /// Full resolution. Does not check node status; see [`Location::ensure_active`].
    pub fn locate(
        &self,
        management: &ScopedConnection<'_>,
        docid: &DocumentId,
    ) -> ShardResult<Location> {
        let namespace = self.resolve_namespace(docid.namespace())?;
        let shard = Self::shard_index(docid, &namespace);
        let database = self.database_name(&namespace, shard)?;
        let assignment = self.resolve_node(management, &namespace, shard)?;
        let node = self
            .metadata
            .node(assignment.node_id)?
            .ok_or_else(|| ShardError::NodeNotFound {
                namespace: namespace.name.clone(),
                shard,
                node_id: assignment.node_id,
            })?;

        debug!(
            docid = %docid,
            namespace = %namespace.name,
            shard,
            node = node.id,
            %database,
            "document located"
        );

        Ok(Location {
            docid: docid.as_str().to_string(),
            table: docid.table_name(),
            namespace,
            shard,
            database,
            node,
            shard_status: assignment.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_and_game_bucket_map_to_global() {
        assert_eq!(effective_namespace("*", "janus"), "global");
        assert_eq!(effective_namespace("148", "game"), "global");
        assert_eq!(effective_namespace("*", "game"), "global");
        assert_eq!(effective_namespace("148", "janus"), "148");
        assert_eq!(effective_namespace("global", "janus"), "global");
    }

    fn location(node_status: &str, shard_status: &str) -> Location {
        Location {
            docid: "*:account:abc123".to_string(),
            namespace: Namespace {
                name: "global".to_string(),
                numshards: std::num::NonZeroU32::new(4).unwrap(),
                created: None,
            },
            shard: 1,
            database: "janus_global_1_data".to_string(),
            table: "data_account".to_string(),
            node: Node {
                id: 2,
                host: "db2.internal".to_string(),
                port: 3307,
                username: "shard".to_string(),
                password: "hunter2".to_string(),
                status: node_status.into(),
                weight: 1,
            },
            shard_status: shard_status.into(),
        }
    }

    #[test]
    fn active_requires_node_and_shard() {
        assert!(location("active", "active").ensure_active().is_ok());
        for (node, shard) in [("inactive", "active"), ("active", "inactive"), ("draining", "active")] {
            assert!(matches!(
                location(node, shard).ensure_active(),
                Err(ShardError::NodeInactive { node_id: 2, .. })
            ));
        }
    }

    #[test]
    fn connect_target_uses_node_credentials() {
        let target = location("active", "active").connect_target(Duration::from_secs(3));
        assert_eq!(target.to_string(), "shard@db2.internal:3307/janus_global_1_data");
        assert_eq!(target.password.as_deref(), Some("hunter2"));
        assert_eq!(target.timeout, Duration::from_secs(3));
    }

    #[test]
    fn parse_delegates_to_document_id() {
        assert!(ShardRouter::parse("a:b:c").is_ok());
        assert!(matches!(
            ShardRouter::parse("a:b"),
            Err(ShardError::InvalidIdentifier(_))
        ));
    }
}
