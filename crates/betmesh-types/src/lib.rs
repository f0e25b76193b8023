//! # betmesh-types: Core types for `betmesh`
//!
//! This crate contains the records every node stores and gossips:
//! - Identifiers ([`NodeId`], [`Username`], [`EventId`], [`BetId`])
//! - Money ([`Decimal`] amounts, validated by [`positive_amount`])
//! - Odds ([`Odds`], a strict outcome → payout mapping)
//! - Records ([`Account`], [`Event`], [`Bet`], [`Resolution`])
//! - The gossip envelope ([`ChangeEvent`], [`Envelope`])
//!
//! Merge identity is carried by the key of each record: accounts by
//! username, events by event identifier, bets by the identifier their
//! origin node assigned.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod envelope;
mod odds;

pub use envelope::{ChangeEvent, ChangeKind, Envelope, EnvelopeError};
pub use odds::Odds;
pub use rust_decimal::Decimal;

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum event identifier length in characters.
pub const MAX_EVENT_ID_LEN: usize = 128;

// ============================================================================
// Validation errors
// ============================================================================

/// Errors raised when constructing a record type from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("username exceeds {MAX_USERNAME_LEN} characters")]
    UsernameTooLong,

    #[error("username contains whitespace or control characters")]
    InvalidUsername,

    #[error("event id must not be empty")]
    EmptyEventId,

    #[error("event id exceeds {MAX_EVENT_ID_LEN} characters")]
    EventIdTooLong,

    #[error("event id contains control characters")]
    InvalidEventId,

    #[error("malformed bet id: {0}")]
    InvalidBetId(String),

    #[error("odds must list at least one outcome")]
    EmptyOdds,

    #[error("outcome label must not be empty")]
    EmptyOutcome,

    #[error("odds for outcome {outcome:?} must be positive, got {value}")]
    NonPositiveOdds { outcome: String, value: Decimal },

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

// ============================================================================
// Node identity - Copy
// ============================================================================

/// Identifier of a node in the cluster, assigned by configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

// ============================================================================
// Username - Clone (validated String)
// ============================================================================

/// Account key. Immutable once the account exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::EmptyUsername);
        }
        if name.chars().count() > MAX_USERNAME_LEN {
            return Err(TypeError::UsernameTooLong);
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidUsername);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Username {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

// ============================================================================
// Event identifier - Clone (validated String)
// ============================================================================

/// Betting event key, chosen by whoever creates the event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyEventId);
        }
        if id.chars().count() > MAX_EVENT_ID_LEN {
            return Err(TypeError::EventIdTooLong);
        }
        if id.chars().any(char::is_control) {
            return Err(TypeError::InvalidEventId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EventId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EventId {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for String {
    fn from(value: EventId) -> Self {
        value.0
    }
}

// ============================================================================
// Bet identifier - Copy
// ============================================================================

/// Identifier assigned to a bet by the node that accepted it.
///
/// The origin node is part of the identifier, so two nodes accepting bets
/// concurrently can never mint the same id. Rendered as `"<node>-<seq>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BetId {
    origin: NodeId,
    seq: u64,
}

impl BetId {
    pub fn new(origin: NodeId, seq: u64) -> Self {
        Self { origin, seq }
    }

    /// Node that accepted the bet and debited the stake.
    pub fn origin(self) -> NodeId {
        self.origin
    }

    /// Per-origin sequence number (starts at 1).
    pub fn seq(self) -> u64 {
        self.seq
    }
}

impl Display for BetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.origin, self.seq)
    }
}

impl FromStr for BetId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node, seq) = s
            .split_once('-')
            .ok_or_else(|| TypeError::InvalidBetId(s.to_string()))?;
        let node = node
            .parse::<u32>()
            .map_err(|_| TypeError::InvalidBetId(s.to_string()))?;
        let seq = seq
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidBetId(s.to_string()))?;
        Ok(Self::new(NodeId::new(node), seq))
    }
}

impl TryFrom<String> for BetId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BetId> for String {
    fn from(value: BetId) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Amounts
// ============================================================================

/// Checks that a deposit or stake is strictly positive.
pub fn positive_amount(amount: Decimal) -> Result<Decimal, TypeError> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(TypeError::NonPositiveAmount(amount))
    }
}

// ============================================================================
// Records
// ============================================================================

/// A user account.
///
/// `balance` is only ever changed by the ledger of the node holding the row;
/// replicated copies keep whatever balance they were first received with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: Username,
    /// Salted hash in PHC string format.
    pub password_hash: String,
    pub balance: Decimal,
}

impl Account {
    /// A freshly registered account with a zero balance.
    pub fn new(username: Username, password_hash: impl Into<String>) -> Self {
        Self {
            username,
            password_hash: password_hash.into(),
            balance: Decimal::ZERO,
        }
    }
}

/// A betting event and its payout odds. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub odds: Odds,
}

/// A placed bet. Never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub username: Username,
    pub event_id: EventId,
    #[serde(rename = "bet_option")]
    pub outcome: String,
    pub amount: Decimal,
}

/// Local record of an event's settlement. Never gossiped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub event_id: EventId,
    pub winning_outcome: String,
    pub paid_bets: u64,
    pub total_paid: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("" => Err(TypeError::EmptyUsername); "empty")]
    #[test_case("bob smith" => Err(TypeError::InvalidUsername); "inner space")]
    #[test_case("bob\n" => Err(TypeError::InvalidUsername); "newline")]
    #[test_case("bob" => Ok("bob".to_string()); "plain")]
    #[test_case("jöse_99" => Ok("jöse_99".to_string()); "unicode")]
    fn username_validation(input: &str) -> Result<String, TypeError> {
        Username::new(input).map(String::from)
    }

    #[test]
    fn username_length_is_counted_in_characters() {
        let max = "é".repeat(MAX_USERNAME_LEN);
        assert!(Username::new(max.clone()).is_ok());
        assert_eq!(
            Username::new(format!("{max}é")),
            Err(TypeError::UsernameTooLong)
        );
    }

    #[test]
    fn username_rejected_during_deserialization() {
        let result: Result<Username, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn event_id_allows_spaces_but_not_control_chars() {
        assert!(EventId::new("final match").is_ok());
        assert_eq!(EventId::new("a\u{7}"), Err(TypeError::InvalidEventId));
        assert_eq!(EventId::new(""), Err(TypeError::EmptyEventId));
    }

    #[test]
    fn bet_id_display_and_parse_agree() {
        let id = BetId::new(NodeId::new(3), 17);
        assert_eq!(id.to_string(), "3-17");
        assert_eq!("3-17".parse::<BetId>(), Ok(id));
        assert_eq!(id.origin(), NodeId::new(3));
        assert_eq!(id.seq(), 17);
    }

    #[test_case("17"; "missing node")]
    #[test_case("a-1"; "non numeric node")]
    #[test_case("1-"; "missing seq")]
    #[test_case("1--2"; "negative seq")]
    fn bet_id_rejects_malformed(input: &str) {
        assert!(matches!(
            input.parse::<BetId>(),
            Err(TypeError::InvalidBetId(_))
        ));
    }

    #[test]
    fn bet_ids_from_different_origins_differ() {
        assert_ne!(
            BetId::new(NodeId::new(1), 1),
            BetId::new(NodeId::new(2), 1)
        );
    }

    #[test]
    fn positive_amount_rejects_zero_and_negative() {
        assert!(positive_amount(Decimal::ONE).is_ok());
        assert_eq!(
            positive_amount(Decimal::ZERO),
            Err(TypeError::NonPositiveAmount(Decimal::ZERO))
        );
        assert!(positive_amount(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn bet_serializes_outcome_as_bet_option() {
        let bet = Bet {
            id: BetId::new(NodeId::new(1), 1),
            username: Username::new("bob").unwrap(),
            event_id: EventId::new("coin").unwrap(),
            outcome: "heads".to_string(),
            amount: Decimal::from(40),
        };
        let json = serde_json::to_value(&bet).unwrap();
        assert_eq!(json["bet_option"], "heads");
        assert_eq!(json["id"], "1-1");
    }

    #[test]
    fn amounts_accept_json_numbers() {
        let account: Account = serde_json::from_str(
            r#"{"username":"bob","password_hash":"h","balance":12.5}"#,
        )
        .unwrap();
        assert_eq!(account.balance, Decimal::new(125, 1));
    }
}
