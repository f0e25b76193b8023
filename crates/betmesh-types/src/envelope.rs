//! Gossip envelope: the unit of replication between peers.
//!
//! Every message on a peer channel is a JSON object
//! `{"type": "account" | "event" | "bet", "data": <record>}`.
//! Decoding is two-step so that an unknown `type` can be told apart from a
//! known type with a broken payload: the former is ignored, the latter is
//! malformed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Account, Bet, Event};

/// A replicated change carrying the full new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ChangeEvent {
    Account(Account),
    Event(Event),
    Bet(Bet),
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Account(_) => ChangeKind::Account,
            Self::Event(_) => ChangeKind::Event,
            Self::Bet(_) => ChangeKind::Bet,
        }
    }

    /// Serializes the change into its wire envelope.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }
}

/// Tag of a [`ChangeEvent`], used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Account,
    Event,
    Bet,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Account => "account",
            Self::Event => "event",
            Self::Bet => "bet",
        };
        f.write_str(s)
    }
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A recognized change.
    Change(ChangeEvent),
    /// A well-formed envelope whose `type` this node does not know.
    Unknown(String),
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            data: serde_json::Value,
        }

        let raw: Raw =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        let change = match raw.kind.as_str() {
            "account" => serde_json::from_value(raw.data).map(ChangeEvent::Account),
            "event" => serde_json::from_value(raw.data).map(ChangeEvent::Event),
            "bet" => serde_json::from_value(raw.data).map(ChangeEvent::Bet),
            _ => return Ok(Self::Unknown(raw.kind)),
        };

        change
            .map(Self::Change)
            .map_err(|e| EnvelopeError::InvalidPayload {
                kind: raw.kind,
                reason: e.to_string(),
            })
    }
}

/// Envelope encode/decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("failed to encode envelope: {0}")]
    Encode(String),

    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BetId, Decimal, EventId, NodeId, Odds, Username};

    fn sample_account() -> Account {
        Account::new(Username::new("alice").unwrap(), "$argon2id$stub")
    }

    #[test]
    fn encodes_tagged_envelope() {
        let change = ChangeEvent::Account(sample_account());
        let json: serde_json::Value = serde_json::from_slice(&change.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "account");
        assert_eq!(json["data"]["username"], "alice");
    }

    #[test]
    fn decodes_every_known_kind() {
        let event = Event {
            event_id: EventId::new("coin").unwrap(),
            odds: Odds::from_pairs([("heads", Decimal::TWO), ("tails", Decimal::TWO)]).unwrap(),
        };
        let bet = Bet {
            id: BetId::new(NodeId::new(2), 9),
            username: Username::new("alice").unwrap(),
            event_id: EventId::new("coin").unwrap(),
            outcome: "heads".to_string(),
            amount: Decimal::from(5),
        };

        for change in [
            ChangeEvent::Account(sample_account()),
            ChangeEvent::Event(event),
            ChangeEvent::Bet(bet),
        ] {
            let bytes = change.encode().unwrap();
            assert_eq!(Envelope::decode(&bytes).unwrap(), Envelope::Change(change));
        }
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let decoded = Envelope::decode(br#"{"type":"odds_update","data":{}}"#).unwrap();
        assert_eq!(decoded, Envelope::Unknown("odds_update".to_string()));
    }

    #[test]
    fn known_type_with_bad_payload_is_invalid() {
        let err = Envelope::decode(br#"{"type":"event","data":{"event_id":"x","odds":{}}}"#)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidPayload { ref kind, .. } if kind == "event"));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            Envelope::decode(b"not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(br#"{"data":{}}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn change_kind_matches_variant() {
        let change = ChangeEvent::Account(sample_account());
        assert_eq!(change.kind(), ChangeKind::Account);
        assert_eq!(change.kind().to_string(), "account");
    }
}
