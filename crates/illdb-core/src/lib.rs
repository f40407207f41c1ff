//! illdb-core: shared building blocks for the illdb browser.
//!
//! Holds everything that does not touch a database connection: document
//! identifier parsing and shard hashing, topology domain types, the payload
//! codec (zlib container + embedded size correction), and the browser
//! configuration with its TOML profile file.

pub mod codec;
pub mod config;
pub mod docid;
pub mod error;
pub mod types;

pub use config::{
    BrowserCommand, BrowserConfig, ConnectionOverrides, InactiveReadPolicy, Profile, ProfileFile,
};
pub use docid::DocumentId;
pub use error::{CoreError, CoreResult};
pub use types::*;
