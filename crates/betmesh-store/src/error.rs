//! Store error types.

use std::path::PathBuf;

use betmesh_types::{BetId, Decimal, Username};
use thiserror::Error;

use crate::Table;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while validating, journaling or replaying a commit.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same key is already present.
    #[error("{table} row {key:?} already exists")]
    AlreadyExists { table: Table, key: String },

    /// A referenced row does not exist.
    #[error("{table} row {key:?} not found")]
    NotFound { table: Table, key: String },

    /// Applying a balance delta would drive the balance below zero.
    #[error("balance of {username} would go negative: {balance} + {delta}")]
    NegativeBalance {
        username: Username,
        balance: Decimal,
        delta: Decimal,
    },

    /// A bet row that no local write could have produced.
    #[error("bet {id} is invalid: {reason}")]
    InvalidBet { id: BetId, reason: String },

    /// Applying a balance delta would overflow the decimal range.
    #[error("balance of {username} overflows")]
    BalanceOverflow { username: Username },

    /// I/O error while touching the journal.
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal entry could not be serialized.
    #[error("journal encode error: {0}")]
    Encode(String),

    /// The journal is damaged somewhere other than its tail.
    #[error("journal {path} corrupted at byte {position}: {reason}")]
    Corrupted {
        path: PathBuf,
        position: u64,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn already_exists(table: Table, key: impl ToString) -> Self {
        Self::AlreadyExists {
            table,
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(table: Table, key: impl ToString) -> Self {
        Self::NotFound {
            table,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid_bet(id: BetId, reason: impl Into<String>) -> Self {
        Self::InvalidBet {
            id,
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by the journal rather than by the batch.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Encode(_) | Self::Corrupted { .. })
    }
}
