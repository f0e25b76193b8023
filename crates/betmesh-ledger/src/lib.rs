//! # betmesh-ledger: Balance and bet rules for a `betmesh` node
//!
//! The [`Ledger`] is the only component that changes a balance or creates a
//! bet. It sits on top of a [`SharedStore`](betmesh_store::SharedStore) and
//! hands every committed change to a [`ChangeSink`] for replication.
//!
//! ## Invariants
//!
//! - A balance never goes below zero. A bet larger than the current local
//!   balance is refused and leaves the balance untouched.
//! - A bet and its debit are one commit.
//! - A change is published once per successful call and never on failure.
//!
//! Event resolution is a local settlement step and is deliberately not
//! published: peers settle their own copies, if at all.

mod credentials;
mod error;
mod ledger;
mod sink;

#[cfg(test)]
mod tests;

pub use credentials::{hash_password, verify_password};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::{Ledger, PlacedBet};
pub use sink::{ChangeSink, NullSink, RecordingSink};
