//! Error taxonomy for routing and document access.

use illdb_core::{CoreError, NodeId, NodeStatus};
use illdb_sql::SqlError;
use thiserror::Error;

/// Result type alias for shard operations.
pub type ShardResult<T> = Result<T, ShardError>;

/// Everything that can stop a `get` or `set`.
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("cannot load topology from bucket {bucket:?}: {source}")]
    Configuration {
        bucket: String,
        #[source]
        source: SqlError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid document id {0:?}: expected at least namespace:type:key")]
    InvalidIdentifier(String),

    #[error("unknown namespace {0:?}")]
    UnknownNamespace(String),

    #[error("no shard {shard} assigned for namespace {namespace:?}")]
    ShardNotFound { namespace: String, shard: u32 },

    #[error("shard {shard} of namespace {namespace:?} points at unknown node {node_id}")]
    NodeNotFound {
        namespace: String,
        shard: u32,
        node_id: NodeId,
    },

    #[error(
        "node {node_id} is not active (node status {node_status}, shard status {shard_status})"
    )]
    NodeInactive {
        node_id: NodeId,
        node_status: NodeStatus,
        shard_status: NodeStatus,
    },

    #[error("missing config key {0:?} in management database")]
    MissingConfig(String),

    #[error("invalid topology row in {table}: {message}")]
    Topology { table: String, message: String },

    #[error("cannot connect to node: {0}")]
    Connection(#[source] SqlError),

    #[error("document {0} not found")]
    DocumentNotFound(String),

    #[error("document is not a valid JSON object: {0}")]
    InvalidPayload(String),

    #[error("document has no _meta object")]
    MissingMetaField,

    #[error("invalid document meta: {0}")]
    InvalidMeta(String),

    #[error("cannot compress document: {0}")]
    Compress(String),

    #[error("cannot decompress document: {0}")]
    Decompress(String),

    #[error("update of {docid} failed: {source}")]
    UpdateFailed {
        docid: String,
        #[source]
        source: SqlError,
    },

    #[error("query failed: {0}")]
    Query(#[from] SqlError),
}

impl From<CoreError> for ShardError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidIdentifier(id) => ShardError::InvalidIdentifier(id),
            CoreError::InvalidPayload(msg) => ShardError::InvalidPayload(msg),
            CoreError::MissingMetaField => ShardError::MissingMetaField,
            CoreError::InvalidMeta(msg) => ShardError::InvalidMeta(msg),
            CoreError::Compression(msg) => ShardError::Compress(msg),
            CoreError::Decompression(msg) => ShardError::Decompress(msg),
            CoreError::Config(msg) => ShardError::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_taxonomy() {
        assert!(matches!(
            ShardError::from(CoreError::InvalidIdentifier("x".into())),
            ShardError::InvalidIdentifier(ref id) if id == "x"
        ));
        assert!(matches!(
            ShardError::from(CoreError::MissingMetaField),
            ShardError::MissingMetaField
        ));
        assert!(matches!(
            ShardError::from(CoreError::Decompression("bad".into())),
            ShardError::Decompress(_)
        ));
    }

    #[test]
    fn inactive_message_names_both_statuses() {
        let err = ShardError::NodeInactive {
            node_id: 3,
            node_status: NodeStatus::Active,
            shard_status: NodeStatus::Inactive,
        };
        assert_eq!(
            err.to_string(),
            "node 3 is not active (node status active, shard status inactive)"
        );
    }
}
