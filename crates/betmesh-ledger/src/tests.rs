use std::sync::Arc;

use betmesh_store::{RecordStore, Row, SharedStore};
use betmesh_types::{Bet, BetId, ChangeEvent, Decimal, EventId, NodeId, Odds, Username};
use proptest::prelude::*;
use test_case::test_case;

use crate::{ErrorKind, Ledger, LedgerError, RecordingSink, hash_password};

fn ledger() -> (Ledger, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let ledger = Ledger::new(
        NodeId::new(1),
        SharedStore::new(RecordStore::in_memory()),
        sink.clone(),
    );
    (ledger, sink)
}

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

fn coin() -> EventId {
    EventId::new("coin").unwrap()
}

fn even_odds() -> Odds {
    Odds::from_pairs([("heads", Decimal::TWO), ("tails", Decimal::TWO)]).unwrap()
}

/// bob with 100, event "coin" at 2.0/2.0, sink drained.
fn funded() -> (Ledger, Arc<RecordingSink>) {
    let (ledger, sink) = ledger();
    ledger.register(user("bob"), "h".to_string()).unwrap();
    ledger.deposit(&user("bob"), Decimal::from(100)).unwrap();
    ledger.create_event(coin(), even_odds()).unwrap();
    sink.take();
    (ledger, sink)
}

// ============================================================================
// Registration & login
// ============================================================================

#[test]
fn register_publishes_zero_balance_account() {
    let (ledger, sink) = ledger();
    let account = ledger.register(user("bob"), "h".to_string()).unwrap();

    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(sink.take(), vec![ChangeEvent::Account(account)]);
}

#[test]
fn duplicate_registration_is_a_conflict_and_publishes_nothing() {
    let (ledger, sink) = ledger();
    ledger.register(user("bob"), "h".to_string()).unwrap();
    sink.take();

    let err = ledger.register(user("bob"), "other".to_string()).unwrap_err();
    assert!(matches!(err, LedgerError::UsernameTaken(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(sink.take().is_empty());
}

#[test]
fn login_checks_password() {
    let (ledger, _) = ledger();
    let hash = hash_password("s3cret").unwrap();
    ledger.register(user("bob"), hash).unwrap();

    assert!(ledger.login(&user("bob"), "s3cret").is_ok());
    let err = ledger.login(&user("bob"), "wrong").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = ledger.login(&user("nobody"), "s3cret").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Deposits
// ============================================================================

#[test]
fn deposit_publishes_account_with_new_balance() {
    let (ledger, sink) = ledger();
    ledger.register(user("bob"), "h".to_string()).unwrap();
    sink.take();

    let balance = ledger.deposit(&user("bob"), Decimal::from(100)).unwrap();
    assert_eq!(balance, Decimal::from(100));

    let changes = sink.take();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], ChangeEvent::Account(a) if a.balance == Decimal::from(100)));
}

#[test_case(0; "zero")]
#[test_case(-5; "negative")]
fn deposit_rejects_non_positive_amount(amount: i64) {
    let (ledger, sink) = funded();
    let err = ledger
        .deposit(&user("bob"), Decimal::from(amount))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.balance(&user("bob")).unwrap(), Decimal::from(100));
    assert!(sink.take().is_empty());
}

#[test]
fn deposit_to_unknown_account_is_not_found() {
    let (ledger, _) = ledger();
    let err = ledger.deposit(&user("ghost"), Decimal::ONE).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn duplicate_event_is_a_conflict() {
    let (ledger, sink) = ledger();
    ledger.create_event(coin(), even_odds()).unwrap();
    let err = ledger.create_event(coin(), even_odds()).unwrap_err();

    assert!(matches!(err, LedgerError::EventExists(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(sink.take().len(), 1);
}

// ============================================================================
// Bets
// ============================================================================

#[test]
fn bet_debits_and_publishes_once() {
    let (ledger, sink) = funded();
    let placed = ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::from(40))
        .unwrap();

    assert_eq!(placed.balance, Decimal::from(60));
    assert_eq!(placed.bet.id.origin(), NodeId::new(1));
    assert_eq!(placed.bet.id.seq(), 1);
    assert_eq!(ledger.bets_of(&user("bob")), vec![placed.bet.clone()]);
    assert_eq!(sink.take(), vec![ChangeEvent::Bet(placed.bet)]);
}

#[test]
fn bet_ids_increase_per_node() {
    let (ledger, _) = funded();
    let first = ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::ONE)
        .unwrap();
    let second = ledger
        .place_bet(&user("bob"), &coin(), "tails", Decimal::ONE)
        .unwrap();
    assert_eq!(first.bet.id.seq() + 1, second.bet.id.seq());
}

#[test]
fn exhausted_bet_sequence_is_an_error_not_a_panic() {
    let store = SharedStore::new(RecordStore::in_memory());
    let sink = Arc::new(RecordingSink::new());
    let ledger = Ledger::new(NodeId::new(1), store.clone(), sink.clone());
    ledger.register(user("bob"), "h".to_string()).unwrap();
    ledger.deposit(&user("bob"), Decimal::from(100)).unwrap();
    ledger.create_event(coin(), even_odds()).unwrap();
    store
        .with(|s| {
            s.insert_if_absent(Row::Bet(Bet {
                id: BetId::new(NodeId::new(1), u64::MAX),
                username: user("bob"),
                event_id: coin(),
                outcome: "heads".to_string(),
                amount: Decimal::ONE,
            }))
        })
        .unwrap();
    sink.take();

    let err = ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::ONE)
        .unwrap_err();
    assert!(matches!(err, LedgerError::BetSequenceExhausted(id) if id == NodeId::new(1)));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(ledger.balance(&user("bob")).unwrap(), Decimal::from(100));
    assert!(sink.take().is_empty());
}

#[test_case("ghost", "coin", "heads", 10 => ErrorKind::NotFound; "unknown account")]
#[test_case("bob", "nope", "heads", 10 => ErrorKind::NotFound; "unknown event")]
#[test_case("bob", "coin", "edge", 10 => ErrorKind::Validation; "unknown outcome")]
#[test_case("bob", "coin", "heads", 0 => ErrorKind::Validation; "zero stake")]
#[test_case("bob", "coin", "heads", 101 => ErrorKind::Validation; "over balance")]
fn rejected_bet_changes_nothing(who: &str, on: &str, outcome: &str, amount: i64) -> ErrorKind {
    let (ledger, sink) = funded();
    let err = ledger
        .place_bet(
            &user(who),
            &EventId::new(on).unwrap(),
            outcome,
            Decimal::from(amount),
        )
        .unwrap_err();

    assert_eq!(ledger.balance(&user("bob")).unwrap(), Decimal::from(100));
    assert!(ledger.bets_of(&user("bob")).is_empty());
    assert!(sink.take().is_empty());
    err.kind()
}

#[test]
fn exact_balance_bet_is_allowed() {
    let (ledger, _) = funded();
    let placed = ledger
        .place_bet(&user("bob"), &coin(), "tails", Decimal::from(100))
        .unwrap();
    assert_eq!(placed.balance, Decimal::ZERO);
}

proptest! {
    #[test]
    fn balance_never_negative(ops in prop::collection::vec((any::<bool>(), 1i64..80), 1..48)) {
        let (ledger, _) = funded();
        let bob = user("bob");

        for (is_bet, amount) in ops {
            let amount = Decimal::from(amount);
            let before = ledger.balance(&bob).unwrap();
            if is_bet {
                match ledger.place_bet(&bob, &coin(), "heads", amount) {
                    Ok(placed) => prop_assert_eq!(placed.balance, before - amount),
                    Err(LedgerError::InsufficientBalance { .. }) => {
                        prop_assert!(amount > before);
                        prop_assert_eq!(ledger.balance(&bob).unwrap(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            } else {
                prop_assert_eq!(ledger.deposit(&bob, amount).unwrap(), before + amount);
            }
            prop_assert!(ledger.balance(&bob).unwrap() >= Decimal::ZERO);
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn resolve_pays_winners_stake_times_odds() {
    let (ledger, sink) = funded();
    ledger.register(user("amy"), "h".to_string()).unwrap();
    ledger.deposit(&user("amy"), Decimal::from(50)).unwrap();
    ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::from(40))
        .unwrap();
    ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::from(10))
        .unwrap();
    ledger
        .place_bet(&user("amy"), &coin(), "tails", Decimal::from(50))
        .unwrap();
    sink.take();

    let resolution = ledger.resolve_event(&coin(), "heads").unwrap();

    assert_eq!(resolution.paid_bets, 2);
    assert_eq!(resolution.total_paid, Decimal::from(100));
    // 100 - 40 - 10 + 2 × 50
    assert_eq!(ledger.balance(&user("bob")).unwrap(), Decimal::from(150));
    assert_eq!(ledger.balance(&user("amy")).unwrap(), Decimal::ZERO);
    assert!(sink.take().is_empty(), "resolution is local-only");
}

#[test]
fn resolved_event_refuses_second_resolution_and_new_bets() {
    let (ledger, _) = funded();
    ledger.resolve_event(&coin(), "tails").unwrap();

    let err = ledger.resolve_event(&coin(), "heads").unwrap_err();
    assert!(matches!(err, LedgerError::EventResolved(_)));

    let err = ledger
        .place_bet(&user("bob"), &coin(), "heads", Decimal::ONE)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn resolve_rejects_unknown_outcome_and_event() {
    let (ledger, _) = funded();
    assert_eq!(
        ledger.resolve_event(&coin(), "edge").unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        ledger
            .resolve_event(&EventId::new("nope").unwrap(), "heads")
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}
