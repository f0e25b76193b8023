//! Request handling, independent of the HTTP binding.

use std::collections::HashSet;
use std::sync::Arc;

use betmesh_gossip::{ExistenceOracle, PeerChannels, PeerProbe};
use betmesh_ledger::{Ledger, LedgerError, PlacedBet, hash_password};
use betmesh_types::{Account, Decimal, Event, EventId, NodeId, Odds, Resolution, Username};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{ServerError, ServerResult};

/// Liveness summary for `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub node_id: NodeId,
    /// Open gossip channels, counting both directions.
    pub peers_connected: usize,
    pub peers_configured: usize,
}

/// Everything a request handler needs: the ledger, the peer oracle and a
/// view of the gossip channels.
#[derive(Debug)]
pub struct NodeService<P> {
    ledger: Ledger,
    oracle: ExistenceOracle<P>,
    channels: Arc<PeerChannels>,
}

impl<P: PeerProbe> NodeService<P> {
    pub fn new(ledger: Ledger, oracle: ExistenceOracle<P>, channels: Arc<PeerChannels>) -> Self {
        Self {
            ledger,
            oracle,
            channels,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Creates an account after checking the name is free here and on every
    /// reachable peer.
    ///
    /// The peer check is best effort. Two nodes registering the same name
    /// before either hears of the other both succeed; gossip then keeps each
    /// node's own copy.
    #[instrument(skip_all, fields(%username))]
    pub async fn register(&self, username: Username, password: String) -> ServerResult<Account> {
        if password.is_empty() {
            return Err(ServerError::BadRequest("password must not be empty".to_string()));
        }
        if self.ledger.username_exists(&username) {
            return Err(LedgerError::UsernameTaken(username).into());
        }
        if self.oracle.exists_elsewhere(&username).await {
            return Err(ServerError::TakenElsewhere(username));
        }

        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ServerError::Task(e.to_string()))??;
        Ok(self.ledger.register(username, hash)?)
    }

    #[instrument(skip_all, fields(%username))]
    pub async fn login(&self, username: Username, password: String) -> ServerResult<Account> {
        let ledger = self.ledger.clone();
        let account = tokio::task::spawn_blocking(move || ledger.login(&username, &password))
            .await
            .map_err(|e| ServerError::Task(e.to_string()))??;
        Ok(account)
    }

    /// Whether this node holds `username`. Answers peers' existence checks.
    pub fn check_user(&self, username: &Username) -> bool {
        self.ledger.username_exists(username)
    }

    pub fn balance(&self, username: &Username) -> ServerResult<Decimal> {
        Ok(self.ledger.balance(username)?)
    }

    #[instrument(skip_all, fields(%username, %amount))]
    pub fn deposit(&self, username: &Username, amount: Decimal) -> ServerResult<Decimal> {
        Ok(self.ledger.deposit(username, amount)?)
    }

    #[instrument(skip_all, fields(%event_id))]
    pub fn create_event(&self, event_id: EventId, odds: Odds) -> ServerResult<Event> {
        Ok(self.ledger.create_event(event_id, odds)?)
    }

    /// Events held by this node only.
    pub fn local_events(&self) -> Vec<Event> {
        self.ledger.events()
    }

    /// Local events followed by every reachable peer's local events,
    /// de-duplicated by identifier. The first copy seen is kept, so local
    /// odds win over a peer's.
    #[instrument(skip_all)]
    pub async fn list_events(&self) -> Vec<Event> {
        let local = self.local_events();
        let remote = self.oracle.remote_events().await;

        let mut seen = HashSet::new();
        let merged: Vec<Event> = local
            .into_iter()
            .chain(remote)
            .filter(|event| seen.insert(event.event_id.clone()))
            .collect();
        info!(count = merged.len(), "events listed");
        merged
    }

    #[instrument(skip_all, fields(%username, %event_id, %amount))]
    pub fn place_bet(
        &self,
        username: &Username,
        event_id: &EventId,
        outcome: &str,
        amount: Decimal,
    ) -> ServerResult<PlacedBet> {
        Ok(self.ledger.place_bet(username, event_id, outcome, amount)?)
    }

    #[instrument(skip_all, fields(%event_id))]
    pub fn resolve_event(
        &self,
        event_id: &EventId,
        winning_outcome: &str,
    ) -> ServerResult<Resolution> {
        Ok(self.ledger.resolve_event(event_id, winning_outcome)?)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            node_id: self.ledger.node_id(),
            peers_connected: self.channels.len(),
            peers_configured: self.oracle.registry().len(),
        }
    }
}
