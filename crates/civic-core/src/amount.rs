//! Fixed-point currency amounts.
//!
//! Amounts are held as whole minor units (cents) so that the text fed into the
//! block hash is identical on every machine that re-reads a stored block.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{AMOUNT_DECIMALS, AMOUNT_SCALE};
use crate::error::LedgerError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor_units(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `Amount::from_units(10)` is `10.00`.
    pub fn from_units(units: u64) -> Option<Self> {
        units.checked_mul(AMOUNT_SCALE).map(Self)
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

fn invalid(input: &str, why: &str) -> LedgerError {
    LedgerError::InvalidInput(format!("amount {input:?}: {why}"))
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if s.is_empty() {
            return Err(invalid(input, "empty"));
        }
        if s.starts_with('-') {
            return Err(invalid(input, "must not be negative"));
        }

        let (whole, frac) = match s.split_once('.') {
            Some((_, "")) => return Err(invalid(input, "missing fractional digits")),
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(input, "expected a plain decimal number"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(input, "expected a plain decimal number"));
        }
        if frac.len() > AMOUNT_DECIMALS {
            return Err(invalid(input, "at most two fractional digits are allowed"));
        }

        let units: u64 = whole.parse().map_err(|_| invalid(input, "too large"))?;
        let mut minor: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| invalid(input, "bad fraction"))?
        };
        for _ in frac.len()..AMOUNT_DECIMALS {
            minor *= 10;
        }

        units
            .checked_mul(AMOUNT_SCALE)
            .and_then(|v| v.checked_add(minor))
            .map(Amount)
            .ok_or_else(|| invalid(input, "too large"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / AMOUNT_SCALE,
            self.0 % AMOUNT_SCALE,
            width = AMOUNT_DECIMALS
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string such as \"100.50\" or a whole number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Amount::from_units(v).ok_or_else(|| E::custom(format!("amount {v} is too large")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        match u64::try_from(v) {
            Ok(units) => self.visit_u64(units),
            Err(_) => Err(E::custom(format!("amount {v} must not be negative"))),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Err(E::custom(format!(
            "amount {v} is a float; send it as a decimal string"
        )))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}
