//! Browser configuration and the TOML profile file.
//!
//! Connection settings come from an optional profile file, one table per
//! server, overridden field by field by explicit command-line values:
//!
//! ```toml
//! [profiles.staging]
//! host = "mgmt.staging.internal"
//! port = 3306
//! username = "browser"
//! password = "..."
//! bucket = "janus"
//! connect_timeout_secs = 20
//! allow_inactive_reads = false
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Whether reads may be served by a node that is not active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InactiveReadPolicy {
    /// Reads are gated exactly like writes.
    #[default]
    Refuse,
    /// Reads proceed against inactive nodes (recovery tooling).
    Allow,
}

/// Fully resolved settings consumed by a browser session.
#[derive(Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Name of the management database.
    pub bucket: String,
    pub connect_timeout: Duration,
    pub show_sql: bool,
    pub inactive_reads: InactiveReadPolicy,
}

impl std::fmt::Debug for BrowserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("bucket", &self.bucket)
            .field("connect_timeout", &self.connect_timeout)
            .field("show_sql", &self.show_sql)
            .field("inactive_reads", &self.inactive_reads)
            .finish_non_exhaustive()
    }
}

/// The operation requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    Get { docid: String },
    Set { docid: String, document: String },
    Route { docid: String },
}

impl BrowserCommand {
    pub fn docid(&self) -> &str {
        match self {
            Self::Get { docid } | Self::Set { docid, .. } | Self::Route { docid } => docid,
        }
    }
}

/// One `[profiles.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bucket: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub allow_inactive_reads: Option<bool>,
}

/// The whole profile file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl ProfileFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ProfileFile = toml::from_str(&content)?;
        Ok(file)
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> CoreResult<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| CoreError::Config(format!("unknown profile {name:?}")))
    }
}

/// Values given explicitly on the command line; each one wins over the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bucket: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub allow_inactive_reads: bool,
    pub show_sql: bool,
}

impl BrowserConfig {
    /// Merge an optional profile with command-line overrides.
    pub fn resolve(profile: Option<&Profile>, overrides: ConnectionOverrides) -> CoreResult<Self> {
        let base = profile.cloned().unwrap_or_default();

        let host = overrides
            .host
            .or(base.host)
            .ok_or_else(|| CoreError::Config("no management host given".to_string()))?;
        let bucket = overrides
            .bucket
            .or(base.bucket)
            .ok_or_else(|| CoreError::Config("no bucket given".to_string()))?;
        let connect_timeout = overrides
            .connect_timeout_secs
            .or(base.connect_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let inactive_reads =
            if overrides.allow_inactive_reads || base.allow_inactive_reads.unwrap_or(false) {
                InactiveReadPolicy::Allow
            } else {
                InactiveReadPolicy::Refuse
            };

        Ok(Self {
            host,
            port: overrides.port.or(base.port).unwrap_or(DEFAULT_PORT),
            username: overrides.username.or(base.username),
            password: overrides.password.or(base.password),
            bucket,
            connect_timeout,
            show_sql: overrides.show_sql,
            inactive_reads,
        })
    }
}
