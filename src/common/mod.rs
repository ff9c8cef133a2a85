//! Shared types used across the coordinator and participant.
//!
//! This module plays the same role the teacher's `common` module
//! plays for its wider database: shared identifiers, a lifecycle
//! trait every major component implements, and the numeric type the
//! rest of the crate builds on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a participant / account. In the supported topology
/// there is exactly one account per participant, so the account id
/// doubles as the participant id.
pub type AccountId = String;

/// Client-supplied transaction identifier. Opaque to this system;
/// the client driver is responsible for uniqueness.
pub type TxnId = String;

/// A signed monetary amount, represented as integer cents.
///
/// The source system formats balances with two decimal places and
/// mixes integer/float arithmetic along the way (SPEC_FULL §9);
/// representing amounts as cents end to end sidesteps binary-float
/// drift entirely while still round-tripping exactly through
/// `%.2f`-style text and over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Parses a fixed 2-decimal textual representation, e.g. `"240.00"`
    /// or `"-12.50"`.
    pub fn parse(text: &str) -> Option<Money> {
        let text = text.trim();
        let negative = text.starts_with('-');
        let unsigned = text.trim_start_matches('-');
        let (whole, frac) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let frac_padded = match frac.len() {
            0 => "00".to_string(),
            1 => format!("{frac}0"),
            2 => frac.to_string(),
            _ => return None,
        };
        if !frac_padded.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let whole_cents: i64 = whole.parse().ok()?;
        let frac_cents: i64 = frac_padded.parse().ok()?;
        let magnitude = whole_cents * 100 + frac_cents;
        Some(Money(if negative { -magnitude } else { magnitude }))
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / 100;
        let frac = magnitude % 100;
        if negative {
            write!(f, "-{whole}.{frac:02}")
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

/// Health of a long-running component, as reported to operators and
/// used internally by the inactivity monitors to decide whether to
/// keep probing or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Lifecycle trait shared by the coordinator and the participant.
///
/// Mirrors the teacher's `common::Component` trait (initialize /
/// shutdown / health_check), trimmed to the two components this
/// system actually has.
pub trait Component: Send + Sync {
    fn shutdown(&self);
    fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_parses_and_displays_round_trip() {
        for text in ["240.00", "0.00", "-12.50", "18.00", "108.00", "1.05"] {
            let m = Money::parse(text).unwrap();
            assert_eq!(m.to_string(), text);
        }
    }

    #[test]
    fn money_pads_short_fractions() {
        assert_eq!(Money::parse("5").unwrap().to_string(), "5.00");
        assert_eq!(Money::parse("5.1").unwrap().to_string(), "5.10");
    }

    #[test]
    fn money_rejects_garbage() {
        assert!(Money::parse("abc").is_none());
        assert!(Money::parse("1.234").is_none());
        assert!(Money::parse("").is_none());
    }

    #[test]
    fn money_arithmetic() {
        let a = Money::from_cents(20000);
        let delta = Money::from_cents(-10000);
        let sum = a.checked_add(delta).unwrap();
        assert_eq!(sum.to_string(), "100.00");
        assert!(delta.is_negative());
        assert_eq!(delta.abs().to_string(), "100.00");
    }
}
