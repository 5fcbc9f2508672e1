//! Common settings and configuration for the oracle agents
//!
//! ## Introduction
//!
//! Every oracle node shares a core configuration: how to log, how long write
//! locks in the shared store live, one entry per Ethereum network it serves
//! and the Cosmos network it accepts deposits from. Agents wrap [`Settings`]
//! in their own settings type and add what only they need.
//!
//! ### Configuration
//!
//! Agents read settings from config files, then from the environment.
//!
//! Environment variable names correspond 1:1 with the JSON object hierarchy:
//! the `ORACLE_` prefix, then each nested key separated by `__`. For example
//! `ORACLE_STORE__LOCK_LEASE_TIMEOUT_MS=30000` overrides
//!
//! ```json
//! { "store": { "lock_lease_timeout_ms": 60000, "db": "./db" } }
//! ```
//!
//! ### Configuration value precedence
//!
//! Later sources take precedence:
//!
//! 1. Every `./config/*.json` file, if the directory exists.
//! 2. The files listed in `CONFIG_FILES`, comma separated, in order.
//! 3. Environment variables prefixed with `ORACLE_`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{bail, Result};
use serde::Deserialize;
use tracing::warn;

use oracle_core::OracleStore;

use crate::{DbError, InMemoryStore, RocksStore};

pub use chains::*;
pub use loader::load_settings_object;
pub use trace::*;

mod chains;
mod loader;
mod trace;

/// Settings of an agent defined from configuration
pub trait LoadableFromSettings: AsRef<Settings> + Sized {
    /// Create a new instance of these settings by reading the configs and env
    /// vars.
    fn load() -> Result<Self>;
}

/// Shared store settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Lease of a write lock; a lock older than this may be taken over
    #[serde(default = "default_lock_lease_timeout_ms")]
    pub lock_lease_timeout_ms: u64,
    /// RocksDB directory. Without one the store lives in memory and is
    /// lost on restart.
    #[serde(default)]
    pub db: Option<PathBuf>,
}

impl StoreConfig {
    /// Open the store these settings describe.
    pub fn open(&self) -> Result<Arc<dyn OracleStore>, DbError> {
        match &self.db {
            Some(path) => Ok(Arc::new(RocksStore::from_path(path, self)?)),
            None => {
                warn!("No db path configured, runner heights will not survive a restart");
                Ok(Arc::new(InMemoryStore::new(self)))
            }
        }
    }
}

fn default_lock_lease_timeout_ms() -> u64 {
    60_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_lease_timeout_ms: default_lock_lease_timeout_ms(),
            db: None,
        }
    }
}

/// Settings shared by every oracle agent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Logging
    #[serde(default)]
    pub tracing: TracingConfig,
    /// Shared store
    #[serde(default)]
    pub store: StoreConfig,
    /// Ethereum networks served by this node
    #[serde(default)]
    pub ethereum_networks: Vec<EthereumNetworkConfig>,
    /// The Cosmos network deposits come from
    pub cosmos_network: Option<CosmosNetworkConfig>,
}

impl AsRef<Settings> for Settings {
    fn as_ref(&self) -> &Settings {
        self
    }
}

impl Settings {
    /// Check every network and that no two networks share a chain domain.
    pub fn validate(&self) -> Result<()> {
        let mut domains = HashSet::new();
        for network in &self.ethereum_networks {
            network.validate()?;
            if !domains.insert(network.chain()?.chain_domain) {
                bail!("Duplicate chain domain for {}", network.chain_name);
            }
        }
        if let Some(cosmos) = &self.cosmos_network {
            cosmos.validate()?;
            if !domains.insert(cosmos.chain().chain_domain) {
                bail!("Duplicate chain domain for {}", cosmos.chain_name);
            }
        }
        Ok(())
    }
}
