//! # betmesh-server: A `betmesh` node
//!
//! Exposes the ledger over HTTP/JSON and runs the gossip transport next to
//! it. Both share one [`SharedStore`](betmesh_store::SharedStore):
//!
//! ```text
//! HTTP request ──► NodeService ──► Ledger ──► RecordStore
//!                      │              │
//!                      │              └──► Broadcaster ──► peer channels
//!                      └──► ExistenceOracle ──► peers' /check_user, /local_events
//!
//! peer channel ──► Reconciler ──► RecordStore
//! ```
//!
//! Start a node with [`start`] (or [`start_with_listeners`] when the caller
//! owns the sockets) and stop it with [`NodeHandle::shutdown`].

mod error;
mod node;
pub mod routes;
mod service;

pub use error::{ErrorBody, ServerError, ServerResult};
pub use node::{NodeHandle, start, start_with_listeners};
pub use routes::router;
pub use service::{Health, NodeService};
