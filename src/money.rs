//! Fixed-point monetary amounts.
//!
//! Amounts are carried as integer minor units (cents), so the cashier
//! screen's "cash + mobile money must equal the staged total" check is
//! exact integer equality rather than a float comparison. The remote
//! service sends amounts both as JSON numbers and as decimal strings
//! (`"total_value": "50.00"`), so deserialization accepts either.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative monetary amount in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Money(i64);

/// Amount failed to parse as a two-decimal non-negative value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0}")]
pub struct InvalidAmount(pub String);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from minor units (cents).
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// The amount in minor units.
    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Mean of a total over `count` items, rounded down to the cent.
    /// A zero count yields zero, never a division error.
    pub fn average_over(self, count: u64) -> Money {
        if count == 0 {
            Money::ZERO
        } else {
            Money(self.0 / count as i64)
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = InvalidAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(InvalidAmount("empty string".into()));
        }
        if raw.starts_with('-') {
            return Err(InvalidAmount(format!("{raw} is negative")));
        }

        let (whole, frac) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount(raw.into()));
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount(raw.into()));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| InvalidAmount(format!("{raw} is out of range")))?;
        let cents = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().unwrap_or(0) * 10,
            _ => frac.parse::<i64>().unwrap_or(0),
        };

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .map(Money)
            .ok_or_else(|| InvalidAmount(format!("{raw} is out of range")))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Two-decimal values are exactly representable here.
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MoneyVisitor;

        impl Visitor<'_> for MoneyVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative amount with at most two decimal places")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
                (v as i64)
                    .checked_mul(100)
                    .map(Money)
                    .ok_or_else(|| E::custom(format!("amount {v} is out of range")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
                if v < 0 {
                    return Err(E::custom(format!("amount {v} is negative")));
                }
                self.visit_u64(v as u64)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom(format!("amount {v} is not a valid value")));
                }
                let scaled = v * 100.0;
                let rounded = scaled.round();
                if (scaled - rounded).abs() > 1e-6 {
                    return Err(E::custom(format!(
                        "amount {v} has more than two decimal places"
                    )));
                }
                Ok(Money(rounded as i64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
                v.parse().map_err(|e: InvalidAmount| E::custom(e))
            }
        }

        deserializer.deserialize_any(MoneyVisitor)
    }
}
