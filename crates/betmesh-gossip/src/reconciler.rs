//! Merging inbound changes into the local store.
//!
//! Merge is insert-if-absent by record key, so applying the same change any
//! number of times leaves the store as applying it once would, and a local
//! record is never overwritten by a peer's copy.
//!
//! Replicated bets are stored as facts, not re-executed: no balance moves
//! when a peer's bet arrives. Only the node that accepted a bet debits it.
//! Peers never relay, so a bet carrying this node's own origin is an echo or
//! a forgery and is dropped before it can disturb local bet numbering.

use betmesh_store::{InsertOutcome, Row, SharedStore, StoreError};
use betmesh_types::{BetId, ChangeEvent, ChangeKind, Envelope, EventId, NodeId, Username};
use tracing::{debug, error, warn};

/// Why an inbound change was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The bet's owner is not known here.
    UnknownAccount(Username),
    /// The bet's event is not known here.
    UnknownEvent(EventId),
    /// The bet claims this node as its origin.
    OwnBet(BetId),
    /// The bet's stake or outcome is not one a ledger would accept.
    InvalidBet(String),
    /// The store refused the row for another reason.
    Rejected(String),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAccount(u) => write!(f, "unknown account {u}"),
            Self::UnknownEvent(e) => write!(f, "unknown event {e}"),
            Self::OwnBet(id) => write!(f, "bet {id} claims this node as origin"),
            Self::InvalidBet(reason) => write!(f, "invalid bet: {reason}"),
            Self::Rejected(reason) => write!(f, "rejected by store: {reason}"),
        }
    }
}

/// Result of merging one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new row was inserted.
    Applied,
    /// A row with the same key already existed; nothing changed.
    Duplicate,
    /// The change was understood but could not be applied.
    Dropped(DropReason),
    /// The envelope's `type` is not one this node handles.
    Ignored(String),
    /// The message could not be decoded.
    Malformed(String),
}

/// Applies peer changes to the local store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    node_id: NodeId,
    store: SharedStore,
}

impl Reconciler {
    /// `node_id` is the local node; bets it originated are never merged.
    pub fn new(node_id: NodeId, store: SharedStore) -> Self {
        Self { node_id, store }
    }

    /// Decodes a raw frame and applies it. Never fails.
    pub fn apply_frame(&self, frame: &[u8]) -> ReconcileOutcome {
        match Envelope::decode(frame) {
            Ok(Envelope::Change(change)) => self.apply(change),
            Ok(Envelope::Unknown(kind)) => {
                warn!(%kind, "ignoring gossip message of unknown type");
                ReconcileOutcome::Ignored(kind)
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed gossip message");
                ReconcileOutcome::Malformed(e.to_string())
            }
        }
    }

    /// Applies one decoded change.
    pub fn apply(&self, change: ChangeEvent) -> ReconcileOutcome {
        let kind = change.kind();
        let key = match &change {
            ChangeEvent::Account(a) => a.username.to_string(),
            ChangeEvent::Event(e) => e.event_id.to_string(),
            ChangeEvent::Bet(b) => b.id.to_string(),
        };

        let result = self.store.with(|s| {
            let row = match change {
                ChangeEvent::Account(account) => Row::Account(account),
                ChangeEvent::Event(event) => Row::Event(event),
                ChangeEvent::Bet(bet) => {
                    if bet.id.origin() == self.node_id {
                        return Err(DropReason::OwnBet(bet.id));
                    }
                    if s.account(&bet.username).is_none() {
                        return Err(DropReason::UnknownAccount(bet.username));
                    }
                    if s.event(&bet.event_id).is_none() {
                        return Err(DropReason::UnknownEvent(bet.event_id));
                    }
                    Row::Bet(bet)
                }
            };
            s.insert_if_absent(row).map_err(|e| match e {
                StoreError::InvalidBet { reason, .. } => DropReason::InvalidBet(reason),
                e => {
                    if e.is_internal() {
                        error!(error = %e, "store failure while merging gossip");
                    }
                    DropReason::Rejected(e.to_string())
                }
            })
        });

        let outcome = match result {
            Ok(InsertOutcome::Inserted) => ReconcileOutcome::Applied,
            Ok(InsertOutcome::AlreadyExists) => ReconcileOutcome::Duplicate,
            Err(reason) => ReconcileOutcome::Dropped(reason),
        };
        log_outcome(kind, &key, &outcome);
        outcome
    }
}

fn log_outcome(kind: ChangeKind, key: &str, outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Applied => debug!(%kind, key, "merged peer change"),
        ReconcileOutcome::Duplicate => debug!(%kind, key, "peer change already present"),
        ReconcileOutcome::Dropped(reason) => {
            warn!(%kind, key, %reason, "dropping peer change");
        }
        ReconcileOutcome::Ignored(_) | ReconcileOutcome::Malformed(_) => {}
    }
}
