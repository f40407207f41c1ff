//! Session: one browser invocation against one management database.
//!
//! Opens the management connection, loads topology, and dispatches
//! `get`/`set`/`route` commands. The management connection stays open for
//! routing queries until the session is dropped.

use illdb_core::{BrowserCommand, BrowserConfig};
use illdb_sql::{ConnectTarget, ConnectionRegistry, ScopedConnection};
use tracing::debug;

use crate::accessor::{DocumentAccessor, SetOutcome};
use crate::error::{ShardError, ShardResult};
use crate::metadata::MetadataStore;
use crate::router::{Location, ShardRouter};

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Document(Vec<u8>),
    Updated(SetOutcome),
    Route(Location),
}

/// A loaded topology plus the connection used to query it.
pub struct Session<'r> {
    config: &'r BrowserConfig,
    registry: &'r ConnectionRegistry,
    management: ScopedConnection<'r>,
    metadata: MetadataStore,
}

impl<'r> Session<'r> {
    /// Connect to the management database and load topology.
    pub fn open(config: &'r BrowserConfig, registry: &'r ConnectionRegistry) -> ShardResult<Self> {
        let target = ConnectTarget::new(&config.host, config.port, &config.bucket)
            .with_credentials(config.username.as_deref(), config.password.as_deref())
            .with_timeout(config.connect_timeout);
        let management = registry
            .open(&target)
            .map_err(|source| ShardError::Configuration {
                bucket: config.bucket.clone(),
                source,
            })?;
        let metadata = MetadataStore::load(&management, &config.bucket)?;
        debug!(bucket = %config.bucket, "session ready");
        Ok(Self {
            config,
            registry,
            management,
            metadata,
        })
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    fn router(&self) -> ShardRouter<'_> {
        ShardRouter::new(&self.metadata, &self.config.bucket)
    }

    fn accessor(&self) -> DocumentAccessor<'r> {
        DocumentAccessor::new(
            self.registry,
            self.config.connect_timeout,
            self.config.inactive_reads,
        )
    }

    /// Resolve a document id without touching its node.
    pub fn route(&self, docid: &str) -> ShardResult<Location> {
        let docid = ShardRouter::parse(docid)?;
        self.router().locate(&self.management, &docid)
    }

    pub fn get(&self, docid: &str) -> ShardResult<Vec<u8>> {
        let location = self.route(docid)?;
        self.accessor().get(&location)
    }

    pub fn set(&self, docid: &str, document: &str) -> ShardResult<SetOutcome> {
        let location = self.route(docid)?;
        self.accessor().set(&location, document)
    }

    pub fn dispatch(&self, command: &BrowserCommand) -> ShardResult<CommandOutput> {
        match command {
            BrowserCommand::Get { docid } => self.get(docid).map(CommandOutput::Document),
            BrowserCommand::Set { docid, document } => {
                self.set(docid, document).map(CommandOutput::Updated)
            }
            BrowserCommand::Route { docid } => self.route(docid).map(CommandOutput::Route),
        }
    }
}
