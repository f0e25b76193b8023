use betmesh_types::{Account, Bet, BetId, Decimal, Event, EventId, NodeId, Odds, Username};
use proptest::prelude::*;
use tempfile::TempDir;
use test_case::test_case;

use crate::{
    InsertOutcome, JOURNAL_FILE, Mutation, RecordStore, Row, SharedStore, StoreError,
    StoreOptions, Table,
};

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

fn event(id: &str) -> Event {
    Event {
        event_id: EventId::new(id).unwrap(),
        odds: Odds::from_pairs([("heads", Decimal::TWO), ("tails", Decimal::TWO)]).unwrap(),
    }
}

fn bet(origin: u32, seq: u64, who: &str, on: &str, amount: i64) -> Bet {
    Bet {
        id: BetId::new(NodeId::new(origin), seq),
        username: user(who),
        event_id: EventId::new(on).unwrap(),
        outcome: "heads".to_string(),
        amount: Decimal::from(amount),
    }
}

fn seeded() -> RecordStore {
    let mut store = RecordStore::in_memory();
    store
        .commit(vec![
            Mutation::InsertAccount(Account::new(user("bob"), "h")),
            Mutation::InsertEvent(event("coin")),
            Mutation::AdjustBalance {
                username: user("bob"),
                delta: Decimal::from(100),
            },
        ])
        .unwrap();
    store
}

// ============================================================================
// insert_if_absent
// ============================================================================

#[test]
fn insert_if_absent_keeps_first_row() {
    let mut store = RecordStore::in_memory();
    let first = Account::new(user("alice"), "first");
    let second = Account::new(user("alice"), "second");

    assert_eq!(
        store.insert_if_absent(Row::Account(first)).unwrap(),
        InsertOutcome::Inserted
    );
    assert_eq!(
        store.insert_if_absent(Row::Account(second)).unwrap(),
        InsertOutcome::AlreadyExists
    );
    assert_eq!(store.account(&user("alice")).unwrap().password_hash, "first");
    assert_eq!(store.commit_seq(), 1);
}

#[test_case("ghost", "coin", Table::Accounts; "unknown account")]
#[test_case("bob", "nowhere", Table::Events; "unknown event")]
fn dangling_bet_is_rejected(who: &str, on: &str, missing: Table) {
    let mut store = seeded();
    let err = store
        .insert_if_absent(Row::Bet(bet(2, 1, who, on, 5)))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { table, .. } if table == missing));
    assert_eq!(store.bets().count(), 0);
}

#[test_case(0, "heads"; "zero stake")]
#[test_case(-10, "heads"; "negative stake")]
#[test_case(5, "edge"; "outcome not offered")]
fn bet_no_ledger_could_place_is_rejected(amount: i64, outcome: &str) {
    let mut store = seeded();
    let mut row = bet(2, 1, "bob", "coin", amount);
    row.outcome = outcome.to_string();

    let err = store.insert_if_absent(Row::Bet(row)).unwrap_err();
    let expected = BetId::new(NodeId::new(2), 1);
    assert!(matches!(err, StoreError::InvalidBet { id, .. } if id == expected));
    assert!(!err.is_internal());
    assert_eq!(store.bets().count(), 0);
}

#[test]
fn bet_outcome_is_checked_against_event_in_same_batch() {
    let mut store = RecordStore::in_memory();
    let mut row = bet(2, 1, "bob", "dice", 5);
    row.outcome = "six".to_string();
    let err = store
        .commit(vec![
            Mutation::InsertAccount(Account::new(user("bob"), "h")),
            Mutation::InsertEvent(event("dice")),
            Mutation::InsertBet(row),
        ])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidBet { .. }));
    assert_eq!(store.commit_seq(), 0);
}

// ============================================================================
// Balances
// ============================================================================

#[test]
fn update_balance_returns_new_balance() {
    let mut store = seeded();
    let balance = store
        .update_balance(&user("bob"), Decimal::from(-40))
        .unwrap();
    assert_eq!(balance, Decimal::from(60));
}

#[test]
fn stake_and_bet_commit_together_or_not_at_all() {
    let mut store = seeded();
    let err = store
        .commit(vec![
            Mutation::AdjustBalance {
                username: user("bob"),
                delta: Decimal::from(-150),
            },
            Mutation::InsertBet(bet(1, 1, "bob", "coin", 150)),
        ])
        .unwrap_err();

    assert!(matches!(err, StoreError::NegativeBalance { .. }));
    assert_eq!(store.account(&user("bob")).unwrap().balance, Decimal::from(100));
    assert!(store.bet(BetId::new(NodeId::new(1), 1)).is_none());
}

proptest! {
    #[test]
    fn balance_never_goes_negative(deltas in prop::collection::vec(-50i64..50, 0..64)) {
        let mut store = seeded();
        let mut expected = Decimal::from(100);

        for delta in deltas {
            let delta = Decimal::from(delta);
            match store.update_balance(&user("bob"), delta) {
                Ok(balance) => {
                    expected += delta;
                    prop_assert_eq!(balance, expected);
                }
                Err(StoreError::NegativeBalance { .. }) => {
                    prop_assert!(expected + delta < Decimal::ZERO);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
            prop_assert!(store.account(&user("bob")).unwrap().balance >= Decimal::ZERO);
        }
    }
}

// ============================================================================
// Bet sequences
// ============================================================================

#[test]
fn highest_bet_seq_is_per_origin() {
    let mut store = seeded();
    for (origin, seq) in [(1, 1), (1, 7), (2, 3), (3, 1)] {
        store
            .insert_if_absent(Row::Bet(bet(origin, seq, "bob", "coin", 1)))
            .unwrap();
    }

    assert_eq!(store.highest_bet_seq(NodeId::new(1)), 7);
    assert_eq!(store.highest_bet_seq(NodeId::new(2)), 3);
    assert_eq!(store.highest_bet_seq(NodeId::new(9)), 0);
    assert_eq!(store.bets_on(&EventId::new("coin").unwrap()).count(), 4);
}

// ============================================================================
// Durability
// ============================================================================

#[test]
fn reopen_replays_committed_batches() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
        assert!(store.is_durable());
        store
            .commit(vec![
                Mutation::InsertAccount(Account::new(user("bob"), "h")),
                Mutation::InsertEvent(event("coin")),
                Mutation::AdjustBalance {
                    username: user("bob"),
                    delta: Decimal::from(100),
                },
            ])
            .unwrap();
        store
            .commit(vec![
                Mutation::AdjustBalance {
                    username: user("bob"),
                    delta: Decimal::from(-40),
                },
                Mutation::InsertBet(bet(1, 1, "bob", "coin", 40)),
            ])
            .unwrap();
    }

    let store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
    assert_eq!(store.account(&user("bob")).unwrap().balance, Decimal::from(60));
    assert_eq!(store.bets().count(), 1);
    assert_eq!(store.commit_seq(), 2);
    assert_eq!(store.highest_bet_seq(NodeId::new(1)), 1);
}

#[test]
fn rejected_batch_is_not_journaled() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
        store
            .insert_if_absent(Row::Event(event("coin")))
            .unwrap();
        let len_before = std::fs::metadata(dir.path().join(JOURNAL_FILE))
            .unwrap()
            .len();
        assert!(store.commit(vec![Mutation::InsertEvent(event("coin"))]).is_err());
        let len_after = std::fs::metadata(dir.path().join(JOURNAL_FILE))
            .unwrap()
            .len();
        assert_eq!(len_before, len_after);
    }

    let store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
    assert_eq!(store.events().count(), 1);
}

#[test]
fn torn_tail_loses_only_last_batch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(JOURNAL_FILE);
    {
        let mut store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
        store.insert_if_absent(Row::Event(event("one"))).unwrap();
        store.insert_if_absent(Row::Event(event("two"))).unwrap();
    }

    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() - 3]).unwrap();

    let store = RecordStore::open(dir.path(), StoreOptions::default()).unwrap();
    let ids: Vec<_> = store.events().map(|e| e.event_id.to_string()).collect();
    assert_eq!(ids, vec!["one"]);
}

// ============================================================================
// SharedStore
// ============================================================================

#[test]
fn shared_store_clones_see_same_tables() {
    let shared = SharedStore::new(seeded());
    let other = shared.clone();

    other.with(|s| s.update_balance(&user("bob"), Decimal::ONE).unwrap());
    let balance = shared.with(|s| s.account(&user("bob")).unwrap().balance);
    assert_eq!(balance, Decimal::from(101));
}

#[test]
fn shared_store_serializes_concurrent_debits() {
    let shared = SharedStore::new(seeded());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                (0..10)
                    .filter(|_| {
                        shared
                            .with(|s| s.update_balance(&user("bob"), Decimal::from(-3)))
                            .is_ok()
                    })
                    .count()
            })
        })
        .collect();

    let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    // 100 / 3 = 33 debits fit, the rest must be refused
    assert_eq!(succeeded, 33);
    let balance = shared.with(|s| s.account(&user("bob")).unwrap().balance);
    assert_eq!(balance, Decimal::ONE);
}
