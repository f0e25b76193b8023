//! # betmesh-store: Local record tables for a `betmesh` node
//!
//! Each node owns one [`RecordStore`] holding four key-indexed tables:
//!
//! | Table         | Key         | Gossiped |
//! |---------------|-------------|----------|
//! | `accounts`    | `Username`  | yes      |
//! | `events`      | `EventId`   | yes      |
//! | `bets`        | `BetId`     | yes      |
//! | `resolutions` | `EventId`   | no       |
//!
//! ## Commits
//!
//! All writes go through [`RecordStore::commit`] with a batch of
//! [`Mutation`]s. A batch is validated as a whole against the current tables
//! before anything is written, then appended to the journal as one frame,
//! then applied in memory. A batch that fails validation leaves no trace.
//!
//! ## Durability
//!
//! A store opened with [`RecordStore::open`] replays `journal.log` on start.
//! [`RecordStore::in_memory`] skips the journal entirely and is what tests
//! and throwaway nodes use.
//!
//! ## Concurrency
//!
//! [`SharedStore`] wraps a store in a single mutex. Every read and every
//! commit happens under that lock, so check-then-write sequences made inside
//! one [`SharedStore::with`] closure are atomic with respect to all other
//! writers on the node.

use std::fmt::Display;

use betmesh_types::{Account, Bet, Event, Resolution};
use serde::{Deserialize, Serialize};

mod error;
mod journal;
mod shared;
mod store;

#[cfg(test)]
mod tests;

pub use error::{StoreError, StoreResult};
pub use shared::SharedStore;
pub use store::{Mutation, RecordStore, StoreOptions};

/// File name of the journal inside a node's data directory.
pub const JOURNAL_FILE: &str = "journal.log";

/// The tables a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Accounts,
    Events,
    Bets,
    Resolutions,
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Accounts => "accounts",
            Self::Events => "events",
            Self::Bets => "bets",
            Self::Resolutions => "resolutions",
        };
        f.write_str(s)
    }
}

/// A whole row destined for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Row {
    Account(Account),
    Event(Event),
    Bet(Bet),
    Resolution(Resolution),
}

impl Row {
    pub fn table(&self) -> Table {
        match self {
            Self::Account(_) => Table::Accounts,
            Self::Event(_) => Table::Events,
            Self::Bet(_) => Table::Bets,
            Self::Resolution(_) => Table::Resolutions,
        }
    }

    /// The row's primary key rendered as text, for logs and errors.
    pub fn key(&self) -> String {
        match self {
            Self::Account(a) => a.username.to_string(),
            Self::Event(e) => e.event_id.to_string(),
            Self::Bet(b) => b.id.to_string(),
            Self::Resolution(r) => r.event_id.to_string(),
        }
    }
}

/// Outcome of [`RecordStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key was already present; nothing changed.
    AlreadyExists,
}
