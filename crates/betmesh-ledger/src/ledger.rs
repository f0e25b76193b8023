//! The ledger: every balance change and bet creation on a node goes through here.
//!
//! Each mutating call follows the same shape:
//!
//! 1. Check preconditions and build a [`Mutation`] batch under the store lock.
//! 2. Commit the batch (atomic: validate, journal, apply).
//! 3. Release the lock, then hand the resulting record to the [`ChangeSink`].
//!
//! Step 3 only happens after a successful commit, exactly once per call.

use std::collections::BTreeMap;
use std::sync::Arc;

use betmesh_store::{Mutation, SharedStore};
use betmesh_types::{
    Account, Bet, BetId, ChangeEvent, Decimal, Event, EventId, NodeId, Odds, Resolution, Username,
    positive_amount,
};
use tracing::{debug, info};

use crate::credentials::verify_password;
use crate::{ChangeSink, LedgerError, LedgerResult};

/// A bet accepted by this node and the staker's balance after the debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBet {
    pub bet: Bet,
    pub balance: Decimal,
}

/// Balance and bet rules on top of a node's [`SharedStore`].
#[derive(Clone)]
pub struct Ledger {
    node_id: NodeId,
    store: SharedStore,
    sink: Arc<dyn ChangeSink>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("node_id", &self.node_id)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    pub fn new(node_id: NodeId, store: SharedStore, sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            node_id,
            store,
            sink,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Creates an account with a zero balance.
    ///
    /// `password_hash` must already be a PHC string; see
    /// [`hash_password`](crate::hash_password).
    pub fn register(&self, username: Username, password_hash: String) -> LedgerResult<Account> {
        let account = Account::new(username, password_hash);

        self.store.with(|s| {
            if s.account(&account.username).is_some() {
                return Err(LedgerError::UsernameTaken(account.username.clone()));
            }
            s.commit(vec![Mutation::InsertAccount(account.clone())])?;
            Ok(())
        })?;

        info!(username = %account.username, "account registered");
        self.sink.publish(ChangeEvent::Account(account.clone()));
        Ok(account)
    }

    /// Credits `amount` to `username` and returns the new balance.
    pub fn deposit(&self, username: &Username, amount: Decimal) -> LedgerResult<Decimal> {
        let amount = positive_amount(amount)?;

        let account = self.store.with(|s| {
            if s.account(username).is_none() {
                return Err(LedgerError::AccountNotFound(username.clone()));
            }
            s.update_balance(username, amount)?;
            s.account(username)
                .cloned()
                .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))
        })?;

        info!(%username, %amount, balance = %account.balance, "deposit applied");
        let balance = account.balance;
        self.sink.publish(ChangeEvent::Account(account));
        Ok(balance)
    }

    /// Creates a betting event. Events are immutable once created.
    pub fn create_event(&self, event_id: EventId, odds: Odds) -> LedgerResult<Event> {
        let event = Event { event_id, odds };

        self.store.with(|s| {
            if s.event(&event.event_id).is_some() {
                return Err(LedgerError::EventExists(event.event_id.clone()));
            }
            s.commit(vec![Mutation::InsertEvent(event.clone())])?;
            Ok(())
        })?;

        info!(event_id = %event.event_id, outcomes = event.odds.len(), "event created");
        self.sink.publish(ChangeEvent::Event(event.clone()));
        Ok(event)
    }

    /// Debits `amount` from `username` and records the bet, as one commit.
    pub fn place_bet(
        &self,
        username: &Username,
        event_id: &EventId,
        outcome: &str,
        amount: Decimal,
    ) -> LedgerResult<PlacedBet> {
        let amount = positive_amount(amount)?;

        let placed = self.store.with(|s| {
            let balance = s
                .account(username)
                .map(|a| a.balance)
                .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;
            let event = s
                .event(event_id)
                .ok_or_else(|| LedgerError::EventNotFound(event_id.clone()))?;
            if !event.odds.contains(outcome) {
                return Err(LedgerError::InvalidOutcome {
                    event_id: event_id.clone(),
                    outcome: outcome.to_string(),
                });
            }
            if s.resolution(event_id).is_some() {
                return Err(LedgerError::EventResolved(event_id.clone()));
            }
            if balance < amount {
                return Err(LedgerError::InsufficientBalance {
                    username: username.clone(),
                    balance,
                    amount,
                });
            }

            let seq = s
                .highest_bet_seq(self.node_id)
                .checked_add(1)
                .ok_or(LedgerError::BetSequenceExhausted(self.node_id))?;
            let bet = Bet {
                id: BetId::new(self.node_id, seq),
                username: username.clone(),
                event_id: event_id.clone(),
                outcome: outcome.to_string(),
                amount,
            };
            s.commit(vec![
                Mutation::AdjustBalance {
                    username: username.clone(),
                    delta: -amount,
                },
                Mutation::InsertBet(bet.clone()),
            ])?;

            // Postcondition: the debit left a non-negative balance
            let balance = s.account(username).map_or(Decimal::ZERO, |a| a.balance);
            assert!(balance >= Decimal::ZERO, "bet drove {username} negative");

            Ok(PlacedBet { bet, balance })
        })?;

        info!(
            bet_id = %placed.bet.id,
            %username,
            %event_id,
            outcome,
            %amount,
            balance = %placed.balance,
            "bet placed"
        );
        self.sink.publish(ChangeEvent::Bet(placed.bet.clone()));
        Ok(placed)
    }

    /// Settles `event_id` on this node only.
    ///
    /// Every winning bet held locally pays `stake × odds` to its owner. The
    /// resolution and all credits commit together. Nothing is published.
    pub fn resolve_event(
        &self,
        event_id: &EventId,
        winning_outcome: &str,
    ) -> LedgerResult<Resolution> {
        let resolution = self.store.with(|s| {
            let event = s
                .event(event_id)
                .ok_or_else(|| LedgerError::EventNotFound(event_id.clone()))?;
            let odds = event
                .odds
                .get(winning_outcome)
                .ok_or_else(|| LedgerError::InvalidOutcome {
                    event_id: event_id.clone(),
                    outcome: winning_outcome.to_string(),
                })?;
            if s.resolution(event_id).is_some() {
                return Err(LedgerError::EventResolved(event_id.clone()));
            }

            let mut credits: BTreeMap<&Username, Decimal> = BTreeMap::new();
            let mut paid_bets = 0u64;
            let mut total_paid = Decimal::ZERO;
            for bet in s.bets_on(event_id).filter(|b| b.outcome == winning_outcome) {
                let payout = bet
                    .amount
                    .checked_mul(odds)
                    .ok_or_else(|| LedgerError::PayoutOverflow(event_id.clone()))?;
                let credit = credits.entry(&bet.username).or_insert(Decimal::ZERO);
                *credit = credit
                    .checked_add(payout)
                    .ok_or_else(|| LedgerError::PayoutOverflow(event_id.clone()))?;
                total_paid = total_paid
                    .checked_add(payout)
                    .ok_or_else(|| LedgerError::PayoutOverflow(event_id.clone()))?;
                paid_bets += 1;
            }

            let resolution = Resolution {
                event_id: event_id.clone(),
                winning_outcome: winning_outcome.to_string(),
                paid_bets,
                total_paid,
            };

            let mut batch = vec![Mutation::InsertResolution(resolution.clone())];
            batch.extend(credits.into_iter().map(|(username, delta)| {
                Mutation::AdjustBalance {
                    username: username.clone(),
                    delta,
                }
            }));
            s.commit(batch)?;

            Ok(resolution)
        })?;

        info!(
            %event_id,
            winning_outcome,
            paid_bets = resolution.paid_bets,
            total_paid = %resolution.total_paid,
            "event resolved"
        );
        Ok(resolution)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Checks `password` against the stored hash of `username`.
    ///
    /// The hash comparison runs outside the store lock.
    pub fn login(&self, username: &Username, password: &str) -> LedgerResult<Account> {
        let account = self.account(username)?;
        if verify_password(password, &account.password_hash)? {
            debug!(%username, "login accepted");
            Ok(account)
        } else {
            debug!(%username, "login rejected");
            Err(LedgerError::BadPassword)
        }
    }

    pub fn account(&self, username: &Username) -> LedgerResult<Account> {
        self.store
            .with(|s| s.account(username).cloned())
            .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))
    }

    pub fn balance(&self, username: &Username) -> LedgerResult<Decimal> {
        self.account(username).map(|a| a.balance)
    }

    pub fn username_exists(&self, username: &Username) -> bool {
        self.store.with(|s| s.account(username).is_some())
    }

    /// Every event this node holds, in identifier order.
    pub fn events(&self) -> Vec<Event> {
        self.store.with(|s| s.events().cloned().collect())
    }

    /// Bets held locally for `username`, from any origin.
    pub fn bets_of(&self, username: &Username) -> Vec<Bet> {
        self.store.with(|s| {
            s.bets()
                .filter(|b| &b.username == username)
                .cloned()
                .collect()
        })
    }
}
