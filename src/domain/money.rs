use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Monetary amount in minor units (cents). Integer only, no floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Major units, e.g. `from_major(35)` == 35.00.
    pub fn from_major(major: i64) -> Self {
        Self {
            cents: major * 100,
        }
    }

    pub fn to_cents(&self) -> i64 {
        self.cents
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.cents
            .checked_add(other.cents)
            .map(Money::from_cents)
            .ok_or_else(|| DomainError::Validation("amount overflow".into()))
    }

    pub fn checked_mul(self, quantity: u32) -> DomainResult<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or_else(|| DomainError::Validation("amount overflow".into()))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.cents
            .checked_sub(other.cents)
            .map(Money::from_cents)
            .ok_or_else(|| DomainError::Validation("amount overflow".into()))
    }

    /// Decimal string in major units, the format Alipay/PayPal expect ("35.00").
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Parses a provider-reported decimal amount ("35.00", "35.5", "35").
    pub fn parse_decimal(s: &str) -> DomainResult<Money> {
        let s = s.trim();
        let (sign, s) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, ""),
        };
        if major.is_empty() && minor.is_empty() {
            return Err(DomainError::Validation(format!("invalid amount: {s:?}")));
        }
        if minor.len() > 2 {
            return Err(DomainError::Validation(format!(
                "amount has sub-cent precision: {s:?}"
            )));
        }
        let major: i64 = if major.is_empty() {
            0
        } else {
            major
                .parse()
                .map_err(|_| DomainError::Validation(format!("invalid amount: {s:?}")))?
        };
        let mut minor_padded = String::from(minor);
        while minor_padded.len() < 2 {
            minor_padded.push('0');
        }
        let minor: i64 = if minor_padded.is_empty() {
            0
        } else {
            minor_padded
                .parse()
                .map_err(|_| DomainError::Validation(format!("invalid amount: {s:?}")))?
        };
        Ok(Money::from_cents(sign * (major * 100 + minor)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}
