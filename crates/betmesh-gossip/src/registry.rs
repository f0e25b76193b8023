//! Static list of sibling nodes.

use serde::{Deserialize, Serialize};

/// Addresses of one peer node, both as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr {
    /// Request transport (HTTP) endpoint, used by the existence oracle.
    pub http: String,
    /// Gossip channel endpoint.
    pub gossip: String,
}

impl PeerAddr {
    pub fn new(http: impl Into<String>, gossip: impl Into<String>) -> Self {
        Self {
            http: http.into(),
            gossip: gossip.into(),
        }
    }
}

impl std::fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.http)
    }
}

/// Peers this node knows about, fixed for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerRegistry {
    peers: Vec<PeerAddr>,
}

impl PeerRegistry {
    /// Builds a registry, dropping duplicate entries but keeping order.
    pub fn new(peers: impl IntoIterator<Item = PeerAddr>) -> Self {
        let mut unique: Vec<PeerAddr> = Vec::new();
        for peer in peers {
            if !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        Self { peers: unique }
    }

    pub fn peers(&self) -> &[PeerAddr] {
        &self.peers
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerAddr> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dedups_and_keeps_order() {
        let registry = PeerRegistry::new([
            PeerAddr::new("127.0.0.1:5002", "127.0.0.1:6002"),
            PeerAddr::new("127.0.0.1:5001", "127.0.0.1:6001"),
            PeerAddr::new("127.0.0.1:5002", "127.0.0.1:6002"),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.peers()[0].http, "127.0.0.1:5002");
        assert_eq!(registry.peers()[1].gossip, "127.0.0.1:6001");
    }
}
