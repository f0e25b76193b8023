//! The record tables and the commit path.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use betmesh_types::{Account, Bet, BetId, Decimal, Event, EventId, NodeId, Resolution, Username};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::journal::{Journal, JournalEntry};
use crate::{InsertOutcome, JOURNAL_FILE, Row, StoreError, StoreResult, Table};

/// A single change to the tables. Batches of mutations commit atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    InsertAccount(Account),
    InsertEvent(Event),
    InsertBet(Bet),
    InsertResolution(Resolution),
    /// Adds `delta` (possibly negative) to an existing account's balance.
    AdjustBalance { username: Username, delta: Decimal },
}

impl From<Row> for Mutation {
    fn from(row: Row) -> Self {
        match row {
            Row::Account(a) => Self::InsertAccount(a),
            Row::Event(e) => Self::InsertEvent(e),
            Row::Bet(b) => Self::InsertBet(b),
            Row::Resolution(r) => Self::InsertResolution(r),
        }
    }
}

/// Options for a journal-backed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// fsync after every commit.
    pub sync_writes: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { sync_writes: true }
    }
}

/// The four tables of a node plus the journal that makes them durable.
pub struct RecordStore {
    accounts: BTreeMap<Username, Account>,
    events: BTreeMap<EventId, Event>,
    bets: BTreeMap<BetId, Bet>,
    resolutions: BTreeMap<EventId, Resolution>,
    journal: Option<Journal>,
    commit_seq: u64,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("accounts", &self.accounts.len())
            .field("events", &self.events.len())
            .field("bets", &self.bets.len())
            .field("resolutions", &self.resolutions.len())
            .field("durable", &self.journal.is_some())
            .field("commit_seq", &self.commit_seq)
            .finish()
    }
}

impl RecordStore {
    /// Creates an empty store with no journal.
    pub fn in_memory() -> Self {
        Self {
            accounts: BTreeMap::new(),
            events: BTreeMap::new(),
            bets: BTreeMap::new(),
            resolutions: BTreeMap::new(),
            journal: None,
            commit_seq: 0,
        }
    }

    /// Opens the store in `dir`, replaying its journal.
    ///
    /// The directory is created if missing. A torn final frame is dropped;
    /// any other damage, or an entry that no longer validates against the
    /// tables rebuilt so far, fails with [`StoreError::Corrupted`].
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(JOURNAL_FILE);

        let (journal, entries) = Journal::open(&path, options.sync_writes)?;
        let mut store = Self::in_memory();

        for (position, entry) in entries {
            store
                .validate(&entry.mutations)
                .map_err(|e| StoreError::Corrupted {
                    path: path.clone(),
                    position,
                    reason: format!("entry {} does not replay: {e}", entry.seq),
                })?;
            store.commit_seq = entry.seq;
            for mutation in entry.mutations {
                store.apply(mutation);
            }
        }

        info!(
            path = %path.display(),
            accounts = store.accounts.len(),
            events = store.events.len(),
            bets = store.bets.len(),
            journal_bytes = journal.len(),
            "record store opened"
        );

        store.journal = Some(journal);
        Ok(store)
    }

    /// Returns true if commits are written to a journal.
    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    /// Sequence number of the last committed batch (0 when nothing committed).
    pub fn commit_seq(&self) -> u64 {
        self.commit_seq
    }

    // ========================================================================
    // Commit path
    // ========================================================================

    /// Validates, journals and applies `batch` as one unit.
    ///
    /// Returns the batch's commit sequence number. On error nothing is
    /// applied and nothing is journaled.
    pub fn commit(&mut self, batch: Vec<Mutation>) -> StoreResult<u64> {
        self.validate(&batch)?;

        let entry = JournalEntry {
            seq: self.commit_seq + 1,
            mutations: batch,
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.append(&entry)?;
        }

        let len = entry.mutations.len();
        for mutation in entry.mutations {
            self.apply(mutation);
        }
        self.commit_seq = entry.seq;

        debug!(seq = entry.seq, mutations = len, "batch committed");
        Ok(entry.seq)
    }

    /// Dry-runs `batch` against the current tables.
    ///
    /// Later mutations in the batch see the effects of earlier ones, so a
    /// batch may insert an account and adjust its balance.
    fn validate(&self, batch: &[Mutation]) -> StoreResult<()> {
        let mut new_accounts: HashSet<&Username> = HashSet::new();
        let mut new_events: HashMap<&EventId, &Event> = HashMap::new();
        let mut new_bets: HashSet<BetId> = HashSet::new();
        let mut new_resolutions: HashSet<&EventId> = HashSet::new();
        let mut balances: HashMap<&Username, Decimal> = HashMap::new();

        for mutation in batch {
            match mutation {
                Mutation::InsertAccount(account) => {
                    let name = &account.username;
                    if self.accounts.contains_key(name) || new_accounts.contains(name) {
                        return Err(StoreError::already_exists(
                            Table::Accounts,
                            &account.username,
                        ));
                    }
                    if account.balance < Decimal::ZERO {
                        return Err(StoreError::NegativeBalance {
                            username: account.username.clone(),
                            balance: account.balance,
                            delta: Decimal::ZERO,
                        });
                    }
                    new_accounts.insert(&account.username);
                    balances.insert(&account.username, account.balance);
                }

                Mutation::InsertEvent(event) => {
                    let id = &event.event_id;
                    if self.events.contains_key(id) || new_events.contains_key(id) {
                        return Err(StoreError::already_exists(Table::Events, &event.event_id));
                    }
                    new_events.insert(&event.event_id, event);
                }

                Mutation::InsertBet(bet) => {
                    if self.bets.contains_key(&bet.id) || new_bets.contains(&bet.id) {
                        return Err(StoreError::already_exists(Table::Bets, bet.id));
                    }
                    let name = &bet.username;
                    if !self.accounts.contains_key(name) && !new_accounts.contains(name) {
                        return Err(StoreError::not_found(Table::Accounts, &bet.username));
                    }
                    let event = self
                        .events
                        .get(&bet.event_id)
                        .or_else(|| new_events.get(&bet.event_id).copied())
                        .ok_or_else(|| StoreError::not_found(Table::Events, &bet.event_id))?;
                    if bet.amount <= Decimal::ZERO {
                        return Err(StoreError::invalid_bet(
                            bet.id,
                            format!("stake {} is not positive", bet.amount),
                        ));
                    }
                    if !event.odds.contains(&bet.outcome) {
                        return Err(StoreError::invalid_bet(
                            bet.id,
                            format!("event {} has no outcome {:?}", event.event_id, bet.outcome),
                        ));
                    }
                    new_bets.insert(bet.id);
                }

                Mutation::InsertResolution(resolution) => {
                    let id = &resolution.event_id;
                    if self.resolutions.contains_key(id) || new_resolutions.contains(id) {
                        return Err(StoreError::already_exists(Table::Resolutions, id));
                    }
                    if !self.events.contains_key(id) && !new_events.contains_key(id) {
                        return Err(StoreError::not_found(Table::Events, id));
                    }
                    new_resolutions.insert(id);
                }

                Mutation::AdjustBalance { username, delta } => {
                    let current = match balances.get(username) {
                        Some(balance) => *balance,
                        None => self
                            .accounts
                            .get(username)
                            .map(|a| a.balance)
                            .ok_or_else(|| StoreError::not_found(Table::Accounts, username))?,
                    };
                    let next = current.checked_add(*delta).ok_or_else(|| {
                        StoreError::BalanceOverflow {
                            username: username.clone(),
                        }
                    })?;
                    if next < Decimal::ZERO {
                        return Err(StoreError::NegativeBalance {
                            username: username.clone(),
                            balance: current,
                            delta: *delta,
                        });
                    }
                    balances.insert(username, next);
                }
            }
        }

        Ok(())
    }

    /// Applies one already-validated mutation.
    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::InsertAccount(account) => {
                let prev = self.accounts.insert(account.username.clone(), account);
                debug_assert!(prev.is_none(), "validated insert replaced an account");
            }
            Mutation::InsertEvent(event) => {
                let prev = self.events.insert(event.event_id.clone(), event);
                debug_assert!(prev.is_none(), "validated insert replaced an event");
            }
            Mutation::InsertBet(bet) => {
                let prev = self.bets.insert(bet.id, bet);
                debug_assert!(prev.is_none(), "validated insert replaced a bet");
            }
            Mutation::InsertResolution(resolution) => {
                let prev = self
                    .resolutions
                    .insert(resolution.event_id.clone(), resolution);
                debug_assert!(prev.is_none(), "validated insert replaced a resolution");
            }
            Mutation::AdjustBalance { username, delta } => {
                if let Some(account) = self.accounts.get_mut(&username) {
                    account.balance += delta;

                    // Postcondition: balances never go negative
                    assert!(
                        account.balance >= Decimal::ZERO,
                        "balance of {username} went negative after validation"
                    );
                }
            }
        }
    }

    // ========================================================================
    // Convenience writes
    // ========================================================================

    /// Inserts `row` unless a row with the same key already exists.
    ///
    /// A present key is not an error. Other validation failures (a bet that
    /// references an unknown account or event) are.
    pub fn insert_if_absent(&mut self, row: Row) -> StoreResult<InsertOutcome> {
        let present = match &row {
            Row::Account(a) => self.accounts.contains_key(&a.username),
            Row::Event(e) => self.events.contains_key(&e.event_id),
            Row::Bet(b) => self.bets.contains_key(&b.id),
            Row::Resolution(r) => self.resolutions.contains_key(&r.event_id),
        };
        if present {
            return Ok(InsertOutcome::AlreadyExists);
        }

        self.commit(vec![row.into()])?;
        Ok(InsertOutcome::Inserted)
    }

    /// Adds `delta` to the balance of `username` and returns the new balance.
    pub fn update_balance(&mut self, username: &Username, delta: Decimal) -> StoreResult<Decimal> {
        self.commit(vec![Mutation::AdjustBalance {
            username: username.clone(),
            delta,
        }])?;
        self.accounts
            .get(username)
            .map(|a| a.balance)
            .ok_or_else(|| StoreError::not_found(Table::Accounts, username))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn account(&self, username: &Username) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub fn event(&self, event_id: &EventId) -> Option<&Event> {
        self.events.get(event_id)
    }

    pub fn bet(&self, id: BetId) -> Option<&Bet> {
        self.bets.get(&id)
    }

    pub fn resolution(&self, event_id: &EventId) -> Option<&Resolution> {
        self.resolutions.get(event_id)
    }

    /// All accounts in username order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// All events in identifier order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    /// All bets in (origin, sequence) order.
    pub fn bets(&self) -> impl Iterator<Item = &Bet> {
        self.bets.values()
    }

    pub fn resolutions(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.values()
    }

    /// Bets placed on `event_id`, from any origin.
    pub fn bets_on<'a>(&'a self, event_id: &'a EventId) -> impl Iterator<Item = &'a Bet> + 'a {
        self.bets.values().filter(move |b| &b.event_id == event_id)
    }

    /// Highest bet sequence number this store holds for `origin`, or 0.
    pub fn highest_bet_seq(&self, origin: NodeId) -> u64 {
        self.bets
            .range(BetId::new(origin, 0)..=BetId::new(origin, u64::MAX))
            .next_back()
            .map_or(0, |(id, _)| id.seq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use betmesh_types::Odds;

    fn alice() -> Username {
        Username::new("alice").unwrap()
    }

    fn coin() -> Event {
        Event {
            event_id: EventId::new("coin").unwrap(),
            odds: Odds::from_pairs([("heads", Decimal::TWO), ("tails", Decimal::TWO)]).unwrap(),
        }
    }

    #[test]
    fn batch_sees_its_own_inserts() {
        let mut store = RecordStore::in_memory();
        store
            .commit(vec![
                Mutation::InsertAccount(Account::new(alice(), "h")),
                Mutation::AdjustBalance {
                    username: alice(),
                    delta: Decimal::from(10),
                },
            ])
            .unwrap();
        assert_eq!(store.account(&alice()).unwrap().balance, Decimal::from(10));
        assert_eq!(store.commit_seq(), 1);
    }

    #[test]
    fn failing_batch_applies_nothing() {
        let mut store = RecordStore::in_memory();
        let err = store
            .commit(vec![
                Mutation::InsertAccount(Account::new(alice(), "h")),
                Mutation::InsertEvent(coin()),
                Mutation::AdjustBalance {
                    username: alice(),
                    delta: Decimal::NEGATIVE_ONE,
                },
            ])
            .unwrap_err();

        assert!(matches!(err, StoreError::NegativeBalance { .. }));
        assert!(store.account(&alice()).is_none());
        assert!(store.event(&coin().event_id).is_none());
        assert_eq!(store.commit_seq(), 0);
    }

    #[test]
    fn duplicate_within_one_batch_is_rejected() {
        let mut store = RecordStore::in_memory();
        let err = store
            .commit(vec![
                Mutation::InsertEvent(coin()),
                Mutation::InsertEvent(coin()),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyExists {
                table: Table::Events,
                ..
            }
        ));
    }

    #[test]
    fn resolution_requires_event() {
        let mut store = RecordStore::in_memory();
        let err = store
            .commit(vec![Mutation::InsertResolution(Resolution {
                event_id: EventId::new("ghost").unwrap(),
                winning_outcome: "heads".to_string(),
                paid_bets: 0,
                total_paid: Decimal::ZERO,
            })])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                table: Table::Events,
                ..
            }
        ));
    }

    #[test]
    fn update_balance_on_missing_account_is_not_found() {
        let mut store = RecordStore::in_memory();
        let err = store.update_balance(&alice(), Decimal::ONE).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                table: Table::Accounts,
                ..
            }
        ));
    }
}
