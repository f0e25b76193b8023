//! Fan-out of committed changes to every open peer channel.

use std::sync::Arc;

use betmesh_ledger::ChangeSink;
use betmesh_types::ChangeEvent;
use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::framing::DEFAULT_MAX_FRAME_BYTES;
use crate::{BroadcastReport, PeerChannels};

/// Serializes a change once and queues it on every channel.
///
/// Delivery is at-most-once per peer per call. A peer that is not connected
/// when `broadcast` runs never sees the change: there is no replay log.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    channels: Arc<PeerChannels>,
    max_frame_bytes: usize,
}

impl Broadcaster {
    pub fn new(channels: Arc<PeerChannels>, max_frame_bytes: usize) -> Self {
        Self {
            channels,
            max_frame_bytes,
        }
    }

    pub fn channels(&self) -> &Arc<PeerChannels> {
        &self.channels
    }

    /// Queues `change` on every open channel. Never fails and never waits.
    pub fn broadcast(&self, change: &ChangeEvent) -> BroadcastReport {
        let frame = match change.encode() {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                error!(kind = %change.kind(), error = %e, "failed to encode change");
                return BroadcastReport::default();
            }
        };
        if frame.len() > self.max_frame_bytes {
            warn!(
                kind = %change.kind(),
                len = frame.len(),
                max = self.max_frame_bytes,
                "change exceeds frame limit, not broadcast"
            );
            return BroadcastReport::default();
        }

        let report = self.channels.send_all(&frame);
        debug!(
            kind = %change.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "change broadcast"
        );
        report
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(Arc::new(PeerChannels::default()), DEFAULT_MAX_FRAME_BYTES)
    }
}

impl ChangeSink for Broadcaster {
    fn publish(&self, change: ChangeEvent) {
        self.broadcast(&change);
    }
}
