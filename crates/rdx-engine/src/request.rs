//! Inputs for deposit and withdrawal operations.

use rdx_types::{Asset, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A deposit reported by the payment or chain watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub user_id: UserId,
    pub asset: Asset,
    pub amount: Decimal,
    /// Held as a pending entry until confirmed, instead of credited at once.
    pub pending: bool,
    /// External reference (transaction hash, payment id), de-duplicated per user.
    pub reference: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
}

impl DepositRequest {
    /// A completed deposit with no external reference.
    #[must_use]
    pub fn new(user_id: UserId, asset: &str, amount: Decimal) -> Self {
        Self {
            user_id,
            asset: asset.to_string(),
            amount,
            pending: false,
            reference: None,
            from_address: None,
            to_address: None,
        }
    }

    #[must_use]
    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_addresses(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_address = Some(from.into());
        self.to_address = Some(to.into());
        self
    }
}

/// A user's request to move funds out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: UserId,
    pub asset: Asset,
    pub amount: Decimal,
    pub fee: Decimal,
    pub destination: String,
}

impl WithdrawalRequest {
    #[must_use]
    pub fn new(user_id: UserId, asset: &str, amount: Decimal, destination: impl Into<String>) -> Self {
        Self {
            user_id,
            asset: asset.to_string(),
            amount,
            fee: Decimal::ZERO,
            destination: destination.into(),
        }
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    /// Amount reserved while the withdrawal is pending.
    #[must_use]
    pub fn reserved(&self) -> Decimal {
        self.amount + self.fee
    }
}
