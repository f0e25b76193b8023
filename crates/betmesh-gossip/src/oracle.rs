//! Cross-node existence checks and listing queries.
//!
//! These go over the request transport, not the gossip channels, and every
//! failure is swallowed: an unreachable or slow peer counts as "no" and
//! contributes nothing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use betmesh_types::{Event, Username};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{GossipError, GossipResult, PeerAddr, PeerRegistry};

/// Default bound on a single peer query.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Queries one peer's request transport.
pub trait PeerProbe: Send + Sync {
    /// Asks `peer` whether it holds an account named `username`.
    fn user_exists(
        &self,
        peer: &PeerAddr,
        username: &Username,
    ) -> impl Future<Output = GossipResult<bool>> + Send;

    /// Asks `peer` for the events it holds locally.
    fn local_events(
        &self,
        peer: &PeerAddr,
    ) -> impl Future<Output = GossipResult<Vec<Event>>> + Send;
}

/// [`PeerProbe`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpPeerProbe {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ExistsReply {
    exists: bool,
}

impl HttpPeerProbe {
    pub fn new(timeout: Duration) -> GossipResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| GossipError::Probe {
                peer: "<client>".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        peer: &PeerAddr,
        segments: &[&str],
    ) -> GossipResult<T> {
        let probe_err = |reason: String| GossipError::Probe {
            peer: peer.http.clone(),
            reason,
        };

        let mut url = reqwest::Url::parse(&format!("http://{}/", peer.http))
            .map_err(|e| probe_err(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| probe_err("address cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);

        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| probe_err(e.to_string()))?
            .json::<T>()
            .await
            .map_err(|e| probe_err(e.to_string()))
    }
}

impl PeerProbe for HttpPeerProbe {
    async fn user_exists(&self, peer: &PeerAddr, username: &Username) -> GossipResult<bool> {
        let reply: ExistsReply = self
            .get_json(peer, &["check_user", username.as_str()])
            .await?;
        Ok(reply.exists)
    }

    async fn local_events(&self, peer: &PeerAddr) -> GossipResult<Vec<Event>> {
        self.get_json(peer, &["local_events"]).await
    }
}

/// Best-effort cluster-wide view built from sequential peer queries.
#[derive(Debug, Clone)]
pub struct ExistenceOracle<P> {
    registry: Arc<PeerRegistry>,
    probe: P,
    timeout: Duration,
}

impl<P: PeerProbe> ExistenceOracle<P> {
    pub fn new(registry: Arc<PeerRegistry>, probe: P, timeout: Duration) -> Self {
        Self {
            registry,
            probe,
            timeout,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Returns true as soon as one peer affirmatively reports `username`.
    ///
    /// Peers are asked one at a time; total latency is bounded by
    /// `peers × timeout`.
    pub async fn exists_elsewhere(&self, username: &Username) -> bool {
        for peer in self.registry.iter() {
            let query = self.probe.user_exists(peer, username);
            let answer = tokio::time::timeout(self.timeout, query)
                .await
                .unwrap_or_else(|_| {
                    Err(GossipError::ProbeTimeout {
                        peer: peer.http.clone(),
                    })
                });
            match answer {
                Ok(true) => {
                    info!(%peer, %username, "username already exists on peer");
                    return true;
                }
                Ok(false) => debug!(%peer, %username, "peer does not know username"),
                Err(e) => warn!(%peer, error = %e, "existence check failed, treating as absent"),
            }
        }
        false
    }

    /// Collects every reachable peer's local events, in registry order.
    pub async fn remote_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for peer in self.registry.iter() {
            let query = self.probe.local_events(peer);
            let listing = tokio::time::timeout(self.timeout, query)
                .await
                .unwrap_or_else(|_| {
                    Err(GossipError::ProbeTimeout {
                        peer: peer.http.clone(),
                    })
                });
            match listing {
                Ok(mut remote) => {
                    debug!(%peer, count = remote.len(), "fetched peer events");
                    events.append(&mut remote);
                }
                Err(e) => warn!(%peer, error = %e, "event listing failed, skipping peer"),
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use betmesh_types::{Decimal, EventId, Odds};

    #[derive(Clone, Copy)]
    enum Reply {
        Yes,
        No,
        Fail,
        Hang,
    }

    struct FakeProbe {
        replies: HashMap<String, Reply>,
        asked: Mutex<Vec<String>>,
    }

    impl FakeProbe {
        fn new(replies: &[(&str, Reply)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(peer, reply)| ((*peer).to_string(), *reply))
                    .collect(),
                asked: Mutex::new(Vec::new()),
            }
        }

        async fn answer<T>(&self, peer: &PeerAddr, yes: T, no: T) -> GossipResult<T> {
            self.asked.lock().unwrap().push(peer.http.clone());
            match self.replies[&peer.http] {
                Reply::Yes => Ok(yes),
                Reply::No => Ok(no),
                Reply::Fail => Err(GossipError::Probe {
                    peer: peer.http.clone(),
                    reason: "connection refused".to_string(),
                }),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(no)
                }
            }
        }
    }

    impl PeerProbe for FakeProbe {
        async fn user_exists(&self, peer: &PeerAddr, _username: &Username) -> GossipResult<bool> {
            self.answer(peer, true, false).await
        }

        async fn local_events(&self, peer: &PeerAddr) -> GossipResult<Vec<Event>> {
            let event = Event {
                event_id: EventId::new(format!("from-{}", peer.http)).unwrap(),
                odds: Odds::from_pairs([("win", Decimal::TWO)]).unwrap(),
            };
            self.answer(peer, vec![event], Vec::new()).await
        }
    }

    fn oracle(replies: &[(&str, Reply)]) -> ExistenceOracle<FakeProbe> {
        let registry = PeerRegistry::new(
            replies
                .iter()
                .map(|(peer, _)| PeerAddr::new(*peer, format!("{peer}-gossip"))),
        );
        ExistenceOracle::new(
            Arc::new(registry),
            FakeProbe::new(replies),
            Duration::from_millis(50),
        )
    }

    fn alice() -> Username {
        Username::new("alice").unwrap()
    }

    #[tokio::test]
    async fn failures_and_timeouts_count_as_absent() {
        let oracle = oracle(&[("a", Reply::Fail), ("b", Reply::Hang), ("c", Reply::No)]);
        assert!(!oracle.exists_elsewhere(&alice()).await);
        assert_eq!(*oracle.probe.asked.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn first_affirmative_reply_stops_the_scan() {
        let oracle = oracle(&[("a", Reply::No), ("b", Reply::Yes), ("c", Reply::Yes)]);
        assert!(oracle.exists_elsewhere(&alice()).await);
        assert_eq!(*oracle.probe.asked.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn no_peers_means_absent() {
        let oracle = oracle(&[]);
        assert!(!oracle.exists_elsewhere(&alice()).await);
        assert!(oracle.remote_events().await.is_empty());
    }

    #[tokio::test]
    async fn remote_events_skip_unreachable_peers() {
        let oracle = oracle(&[("a", Reply::Yes), ("b", Reply::Hang), ("c", Reply::Yes)]);
        let ids: Vec<String> = oracle
            .remote_events()
            .await
            .into_iter()
            .map(|e| e.event_id.to_string())
            .collect();
        assert_eq!(ids, vec!["from-a", "from-c"]);
    }
}
