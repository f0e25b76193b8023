//! # betmesh-gossip: Replication between `betmesh` nodes
//!
//! Nodes replicate by pushing every committed change to every peer they
//! currently have a channel to, and by merging whatever peers push to them.
//!
//! ## Components
//!
//! - [`PeerRegistry`]: the static list of sibling nodes.
//! - [`PeerChannels`]: the set of open channels, each fed by a bounded queue.
//! - [`Broadcaster`]: encodes a change once and queues it on every channel.
//!   It is the node's [`ChangeSink`](betmesh_ledger::ChangeSink).
//! - [`GossipTransport`]: TCP accept/dial plus the reader and writer task of
//!   each channel.
//! - [`Reconciler`]: insert-if-absent merge of inbound changes.
//! - [`ExistenceOracle`]: sequential, timeout-bounded peer queries used at
//!   registration and for the merged event listing.
//!
//! ## Guarantees (and their absence)
//!
//! Delivery is at-most-once per peer per broadcast. There is no ack, no
//! retry and no replay, so a peer that is down when a change is broadcast
//! never receives it. Inbound messages are not authenticated.

mod broadcaster;
mod channels;
mod error;
pub mod framing;
mod oracle;
mod reconciler;
mod registry;
mod transport;

pub use broadcaster::Broadcaster;
pub use channels::{
    BroadcastReport, ChannelId, ChannelInfo, DEFAULT_QUEUE_DEPTH, Direction, PeerChannels,
};
pub use error::{GossipError, GossipResult};
pub use oracle::{DEFAULT_PROBE_TIMEOUT, ExistenceOracle, HttpPeerProbe, PeerProbe};
pub use reconciler::{DropReason, ReconcileOutcome, Reconciler};
pub use registry::{PeerAddr, PeerRegistry};
pub use transport::{GossipSettings, GossipTransport, Shutdown};
