//! Generated configuration for a local multi-node cluster.

use crate::{BetmeshConfig, ConfigError, NodeConfig, Paths, PeerConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-node configurations for `n` nodes on the loopback interface.
///
/// Node `i` listens on `base_http_port + i` and `base_gossip_port + i` and
/// lists every other node as a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    root: PathBuf,
    nodes: Vec<BetmeshConfig>,
}

impl ClusterTopology {
    pub fn local(
        node_count: usize,
        base_http_port: u16,
        base_gossip_port: u16,
        root: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        if node_count == 0 {
            return Err(ConfigError::ValidationError(
                "a cluster needs at least one node".to_string(),
            ));
        }
        let port = |base: u16, i: usize| -> Result<u16, ConfigError> {
            u16::try_from(i)
                .ok()
                .and_then(|i| base.checked_add(i))
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "{node_count} nodes do not fit above port {base}"
                    ))
                })
        };

        let mut addrs = Vec::with_capacity(node_count);
        for i in 0..node_count {
            addrs.push(PeerConfig {
                http: format!("127.0.0.1:{}", port(base_http_port, i)?),
                gossip: format!("127.0.0.1:{}", port(base_gossip_port, i)?),
            });
        }

        let nodes = (0..node_count)
            .map(|i| BetmeshConfig {
                node: NodeConfig {
                    id: i as u32,
                    data_dir: Paths::node_data_dir(),
                    http_addr: addrs[i].http.clone(),
                    gossip_addr: addrs[i].gossip.clone(),
                },
                peers: addrs
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, peer)| peer.clone())
                    .collect(),
                ..BetmeshConfig::default()
            })
            .collect();

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            nodes,
        })
    }

    pub fn nodes(&self) -> &[BetmeshConfig] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&BetmeshConfig> {
        self.nodes.get(id)
    }

    /// Directory holding node `id`'s `betmesh.toml`.
    pub fn node_dir(&self, id: usize) -> PathBuf {
        self.root.join(format!("node-{id}"))
    }

    /// Writes `node-<i>/betmesh.toml` for every node and returns the paths.
    pub fn write(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut written = Vec::with_capacity(self.nodes.len());
        for (id, node) in self.nodes.iter().enumerate() {
            let dir = self.node_dir(id);
            fs::create_dir_all(&dir).map_err(|source| ConfigError::WriteError {
                path: dir.clone(),
                source,
            })?;

            let path = Paths::project_config_file(&dir);
            fs::write(&path, node.to_toml()?).map_err(|source| ConfigError::WriteError {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}
