//! Gossip error types.

use betmesh_types::EnvelopeError;
use thiserror::Error;

/// Result type for gossip operations.
pub type GossipResult<T> = Result<T, GossipError>;

/// Transport-level failures.
///
/// None of these ever reach a ledger caller: the broadcaster, reconciler and
/// oracle log them and carry on.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("peer {addr} unreachable after {attempts} attempts")]
    Unreachable { addr: String, attempts: u32 },

    #[error("probe of peer {peer} failed: {reason}")]
    Probe { peer: String, reason: String },

    #[error("probe of peer {peer} timed out")]
    ProbeTimeout { peer: String },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}
