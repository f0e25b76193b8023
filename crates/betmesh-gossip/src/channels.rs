//! The set of open peer channels.
//!
//! A channel is represented here only by the sending half of its outbound
//! queue. The socket itself belongs to the channel's writer task, which
//! drains the queue. Sending is therefore always `try_send`: it never waits
//! on a peer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Identifier of one registered channel, unique within a [`PeerChannels`].
pub type ChannelId = u64;

/// Default number of frames a channel may have queued.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// A registered channel as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub peer: String,
    pub direction: Direction,
}

/// What happened to one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels that accepted the frame into their queue.
    pub delivered: usize,
    /// Channels whose queue was full; they miss this frame.
    pub dropped: usize,
    /// Channels found closed and removed from the set.
    pub pruned: usize,
}

struct PeerChannel {
    peer: String,
    direction: Direction,
    tx: mpsc::Sender<Bytes>,
}

/// Task-safe registry of open channels.
pub struct PeerChannels {
    queue_depth: usize,
    next_id: AtomicU64,
    channels: Mutex<HashMap<ChannelId, PeerChannel>>,
}

impl std::fmt::Debug for PeerChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannels")
            .field("queue_depth", &self.queue_depth)
            .field("open", &self.len())
            .finish()
    }
}

impl Default for PeerChannels {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl PeerChannels {
    /// # Panics
    ///
    /// Panics if `queue_depth` is 0.
    pub fn new(queue_depth: usize) -> Self {
        assert!(queue_depth > 0, "queue depth must be positive");
        Self {
            queue_depth,
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChannelId, PeerChannel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a channel and returns its id and the receiving end of its queue.
    ///
    /// The channel stays in the set until [`remove`](Self::remove) is called
    /// or a broadcast finds the receiver dropped.
    pub fn register(
        &self,
        peer: impl Into<String>,
        direction: Direction,
    ) -> (ChannelId, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let peer = peer.into();

        info!(channel = id, %peer, %direction, "peer channel open");
        self.lock().insert(
            id,
            PeerChannel {
                peer,
                direction,
                tx,
            },
        );
        (id, rx)
    }

    /// Removes a channel. Returns false if it was already gone.
    pub fn remove(&self, id: ChannelId) -> bool {
        match self.lock().remove(&id) {
            Some(channel) => {
                info!(channel = id, peer = %channel.peer, "peer channel closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the open channels, ordered by id.
    pub fn list(&self) -> Vec<ChannelInfo> {
        let mut list: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, c)| ChannelInfo {
                id: *id,
                peer: c.peer.clone(),
                direction: c.direction,
            })
            .collect();
        list.sort_by_key(|c| c.id);
        list
    }

    /// Queues `frame` on every open channel.
    ///
    /// A closed channel is pruned; a full one skips this frame. Neither
    /// affects delivery to the others.
    pub fn send_all(&self, frame: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut channels = self.lock();

        channels.retain(|id, channel| match channel.tx.try_send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(channel = id, peer = %channel.peer, "peer queue full, frame dropped");
                report.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                warn!(channel = id, peer = %channel.peer, "peer channel closed, pruning");
                report.pruned += 1;
                false
            }
        });

        debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "frame fanned out"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let channels = PeerChannels::new(4);
        let (a, _rx_a) = channels.register("10.0.0.1:6001", Direction::Outbound);
        let (b, _rx_b) = channels.register("10.0.0.2:6002", Direction::Inbound);

        assert_ne!(a, b);
        assert_eq!(channels.len(), 2);
        assert!(channels.remove(a));
        assert!(!channels.remove(a));
        assert_eq!(channels.list()[0].direction, Direction::Inbound);
    }

    #[test]
    fn test_send_all_survives_one_closed_channel() {
        let channels = PeerChannels::new(4);
        let (_, mut rx1) = channels.register("p1", Direction::Outbound);
        let (_, rx2) = channels.register("p2", Direction::Outbound);
        let (_, mut rx3) = channels.register("p3", Direction::Outbound);
        drop(rx2);

        let report = channels.send_all(&Bytes::from_static(b"x"));

        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                dropped: 0,
                pruned: 1
            }
        );
        assert_eq!(channels.len(), 2);
        assert_eq!(rx1.try_recv().unwrap(), "x");
        assert_eq!(rx3.try_recv().unwrap(), "x");
    }

    #[test]
    fn test_full_queue_drops_only_for_that_peer() {
        let channels = PeerChannels::new(1);
        let (_, mut slow) = channels.register("slow", Direction::Outbound);
        let (_, mut fast) = channels.register("fast", Direction::Outbound);

        channels.send_all(&Bytes::from_static(b"one"));
        fast.try_recv().unwrap();
        let report = channels.send_all(&Bytes::from_static(b"two"));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(channels.len(), 2, "a full queue is not pruned");
        assert_eq!(slow.try_recv().unwrap(), "one");
        assert!(slow.try_recv().is_err());
        assert_eq!(fast.try_recv().unwrap(), "two");
    }

    #[test]
    fn test_send_all_with_no_channels() {
        let channels = PeerChannels::default();
        assert_eq!(
            channels.send_all(&Bytes::from_static(b"x")),
            BroadcastReport::default()
        );
    }
}
