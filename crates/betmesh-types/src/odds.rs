//! Payout odds for a betting event.
//!
//! Odds arrive from clients and from peers, so they are parsed through a
//! strict schema: a non-empty map of non-empty outcome labels to strictly
//! positive decimals. Anything else is rejected at deserialization time.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TypeError;

/// Outcome label → payout multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decimal>", into = "BTreeMap<String, Decimal>")]
pub struct Odds(BTreeMap<String, Decimal>);

impl Odds {
    pub fn new(outcomes: BTreeMap<String, Decimal>) -> Result<Self, TypeError> {
        if outcomes.is_empty() {
            return Err(TypeError::EmptyOdds);
        }
        for (outcome, value) in &outcomes {
            if outcome.trim().is_empty() {
                return Err(TypeError::EmptyOutcome);
            }
            if *value <= Decimal::ZERO {
                return Err(TypeError::NonPositiveOdds {
                    outcome: outcome.clone(),
                    value: *value,
                });
            }
        }
        Ok(Self(outcomes))
    }

    /// Builds odds from `(label, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the multiplier for `outcome`, if the event offers it.
    pub fn get(&self, outcome: &str) -> Option<Decimal> {
        self.0.get(outcome).copied()
    }

    pub fn contains(&self, outcome: &str) -> bool {
        self.0.contains_key(outcome)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for Odds {
    type Error = TypeError;

    fn try_from(value: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Odds> for BTreeMap<String, Decimal> {
    fn from(value: Odds) -> Self {
        value.0
    }
}
