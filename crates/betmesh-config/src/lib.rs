//! Configuration management for betmesh nodes
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the binary)
//! 2. Environment variables (BETMESH_* prefix, `__` between section and key)
//! 3. betmesh.local.toml (gitignored, local overrides)
//! 4. betmesh.toml (per-node config)
//! 5. ~/.config/betmesh/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod cluster;
mod error;
mod loader;
mod paths;

pub use cluster::ClusterTopology;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{NODE_CONFIG_FILE, NODE_DATA_DIR, NODE_LOCAL_CONFIG_FILE, Paths};

/// Main node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetmeshConfig {
    pub node: NodeConfig,
    pub peers: Vec<PeerConfig>,
    pub gossip: GossipConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identifier stamped into the bet ids this node allocates.
    pub id: u32,
    pub data_dir: PathBuf,
    pub http_addr: String,
    pub gossip_addr: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: 0,
            data_dir: PathBuf::from(".betmesh/data"),
            http_addr: "127.0.0.1:8080".to_string(),
            gossip_addr: "127.0.0.1:9080".to_string(),
        }
    }
}

/// One sibling node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Request transport address, used for existence checks and listings.
    pub http: String,
    /// Gossip channel address.
    pub gossip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    pub queue_depth: usize,
    pub max_frame_bytes: usize,
    pub dial_attempts: u32,
    pub dial_backoff_ms: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            max_frame_bytes: 1024 * 1024,
            dial_attempts: 10,
            dial_backoff_ms: 200,
        }
    }
}

impl GossipConfig {
    pub fn dial_backoff(&self) -> Duration {
        Duration::from_millis(self.dial_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Per-peer bound on an existence check or listing query.
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep records in memory only; nothing survives a restart.
    pub in_memory: bool,
    /// fsync the journal after every commit.
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            sync_writes: true,
        }
    }
}

impl BetmeshConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific node directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// A throwaway single-node configuration: in-memory storage, no peers.
    pub fn ephemeral() -> Self {
        Self {
            storage: StorageConfig {
                in_memory: true,
                sync_writes: false,
            },
            ..Default::default()
        }
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.node.data_dir.is_relative() {
            self.node.data_dir = base.join(&self.node.data_dir);
        }
    }

    /// Checks values the loader cannot: zero-sized limits and self-peering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.http_addr.trim().is_empty() || self.node.gossip_addr.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "node.http_addr and node.gossip_addr must be set".to_string(),
            ));
        }
        if self.gossip.queue_depth == 0 {
            return Err(ConfigError::ValidationError(
                "gossip.queue_depth must be at least 1".to_string(),
            ));
        }
        if self.gossip.max_frame_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gossip.max_frame_bytes must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if peer.gossip == self.node.gossip_addr || peer.http == self.node.http_addr {
                return Err(ConfigError::ValidationError(format!(
                    "peer {} points at this node",
                    peer.http
                )));
            }
            if !seen.insert(&peer.gossip) {
                return Err(ConfigError::ValidationError(format!(
                    "peer gossip address {} listed twice",
                    peer.gossip
                )));
            }
        }
        Ok(())
    }

    /// Renders the configuration as a `betmesh.toml` document.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
