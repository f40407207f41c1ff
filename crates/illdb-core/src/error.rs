//! Error types for identifier parsing, payload handling, and configuration.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised before any database is involved.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid document id {0:?}: expected at least namespace:type:key")]
    InvalidIdentifier(String),

    #[error("document is not a valid JSON object: {0}")]
    InvalidPayload(String),

    #[error("document has no _meta object")]
    MissingMetaField,

    #[error("invalid document meta: {0}")]
    InvalidMeta(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("configuration error: {0}")]
    Config(String),
}
