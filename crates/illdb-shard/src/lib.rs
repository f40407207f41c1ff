//! illdb-shard: shard resolution and document access.
//!
//! # Flow
//!
//! ```text
//! Session::open(config, registry)
//!   → management connection (held for the whole session)
//!   → MetadataStore::load()            configs / nodes / namespaces
//!
//! Session::get(docid) / Session::set(docid, payload)
//!   → ShardRouter::locate()            namespace → crc32 shard → shards row → node
//!   → DocumentAccessor                 active gate → node connection → row
//!     → get: decompress if meta.compression
//!     → set: size-correct, compress if meta.compression, update, commit
//! ```
//!
//! Every failure is a [`ShardError`]; nothing here retries.

pub mod accessor;
pub mod error;
pub mod metadata;
pub mod router;
pub mod session;

pub use accessor::{DOCUMENT_COLUMNS, DocumentAccessor, DocumentRow, SetOutcome};
pub use error::{ShardError, ShardResult};
pub use metadata::{MetaKey, MetadataStore, MetadataTable, TableSpec};
pub use router::{Location, ShardRouter};
pub use session::{CommandOutput, Session};
