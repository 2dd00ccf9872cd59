//! Balance types for the wallet model.
//!
//! Every (user, asset) pair has an `available` balance (spendable) and a
//! `locked` balance (reserved, e.g. for a pending withdrawal).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RdxError, Result, constants};

/// A single balance entry for a (user, asset) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    /// Spendable balance.
    pub available: Decimal,
    /// Reserved balance awaiting settlement.
    pub locked: Decimal,
}

impl BalanceEntry {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }

    /// Total balance (available + locked).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.locked.is_zero()
    }

    /// Amount held in the given bucket.
    #[must_use]
    pub fn get(&self, bucket: Bucket) -> Decimal {
        match bucket {
            Bucket::Available => self.available,
            Bucket::Locked => self.locked,
        }
    }

    /// Mutable access to the given bucket.
    pub fn get_mut(&mut self, bucket: Bucket) -> &mut Decimal {
        match bucket {
            Bucket::Available => &mut self.available,
            Bucket::Locked => &mut self.locked,
        }
    }
}

impl Default for BalanceEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// One of the two subdivisions of a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Available,
    Locked,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Locked => write!(f, "locked"),
        }
    }
}

/// Wallet account kind. Only `Spot` is exercised by the engine today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[default]
    Spot,
    Futures,
    Savings,
}

/// Type alias for asset identifiers (e.g., "BTC", "USDT", "RDX").
pub type Asset = String;

/// Reject amounts that are not strictly positive or carry more than
/// [`constants::AMOUNT_PRECISION`] decimal places.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(RdxError::InvalidAmount {
            reason: format!("amount must be positive, got {amount}"),
        });
    }
    if amount.normalize().scale() > constants::AMOUNT_PRECISION {
        return Err(RdxError::InvalidAmount {
            reason: format!(
                "amount {amount} exceeds {} decimal places",
                constants::AMOUNT_PRECISION
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_entry_default_is_zero() {
        let entry = BalanceEntry::default();
        assert_eq!(entry.available, Decimal::ZERO);
        assert_eq!(entry.locked, Decimal::ZERO);
        assert!(entry.is_zero());
    }

    #[test]
    fn balance_entry_total() {
        let entry = BalanceEntry {
            available: Decimal::new(60, 0),
            locked: Decimal::new(40, 0),
        };
        assert_eq!(entry.total(), Decimal::new(100, 0));
        assert!(!entry.is_zero());
    }

    #[test]
    fn bucket_accessors() {
        let mut entry = BalanceEntry::new();
        *entry.get_mut(Bucket::Locked) += Decimal::ONE;
        assert_eq!(entry.get(Bucket::Locked), Decimal::ONE);
        assert_eq!(entry.get(Bucket::Available), Decimal::ZERO);
    }

    #[test]
    fn validate_amount_rules() {
        assert!(validate_amount(Decimal::new(1, 8)).is_ok());
        assert!(validate_amount(Decimal::new(15000, 3)).is_ok()); // 15.000 normalises
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(RdxError::InvalidAmount { .. })
        ));
        assert!(validate_amount(Decimal::new(-5, 0)).is_err());
        assert!(validate_amount(Decimal::new(1, 9)).is_err());
    }

    #[test]
    fn account_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AccountKind::Savings).unwrap();
        assert_eq!(json, "\"savings\"");
        assert_eq!(AccountKind::default(), AccountKind::Spot);
    }
}
