//! Ledger error types.

use betmesh_store::StoreError;
use betmesh_types::{Decimal, EventId, NodeId, TypeError, Username};
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error category, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input: amounts, identifiers, odds, outcome labels.
    Validation,
    /// The target already exists or is in a state that forbids the call.
    Conflict,
    /// A referenced account or event is unknown.
    NotFound,
    /// Credentials did not match.
    Unauthorized,
    /// Store or hashing failure. Details are for logs only.
    Internal,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    InvalidInput(#[from] TypeError),

    #[error("username {0} is already taken")]
    UsernameTaken(Username),

    #[error("account {0} not found")]
    AccountNotFound(Username),

    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("event {0} already exists")]
    EventExists(EventId),

    #[error("event {event_id} has no outcome {outcome:?}")]
    InvalidOutcome { event_id: EventId, outcome: String },

    #[error("event {0} is already resolved")]
    EventResolved(EventId),

    #[error("insufficient balance for {username}: has {balance}, needs {amount}")]
    InsufficientBalance {
        username: Username,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("wrong password")]
    BadPassword,

    #[error("payout for event {0} overflows")]
    PayoutOverflow(EventId),

    #[error("bet sequence of node {0} is exhausted")]
    BetSequenceExhausted(NodeId),

    #[error("credential error: {0}")]
    Credential(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidOutcome { .. }
            | Self::InsufficientBalance { .. } => ErrorKind::Validation,
            Self::UsernameTaken(_) | Self::EventExists(_) | Self::EventResolved(_) => {
                ErrorKind::Conflict
            }
            Self::AccountNotFound(_) | Self::EventNotFound(_) => ErrorKind::NotFound,
            Self::BadPassword => ErrorKind::Unauthorized,
            Self::PayoutOverflow(_)
            | Self::BetSequenceExhausted(_)
            | Self::Credential(_) => ErrorKind::Internal,
            Self::Store(e) => match e {
                StoreError::AlreadyExists { .. } => ErrorKind::Conflict,
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::NegativeBalance { .. } | StoreError::BalanceOverflow { .. } => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::Internal,
            },
        }
    }
}
