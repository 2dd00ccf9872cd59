//! Wallet balances for a single user.
//!
//! Tracks per-asset balances with available/locked accounting. Every
//! mutation validates first and then writes, so a failed call leaves the
//! wallet exactly as it was. Asset keys are created lazily on first credit.
//!
//! Arithmetic is checked: a credit that would push `available + locked`
//! past [`Decimal::MAX`] is refused, so every bucket and every total stays
//! representable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rdx_types::{AccountKind, Asset, BalanceEntry, Bucket, RdxError, Result, UserId, validate_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One user's wallet.
///
/// Mutations are only reachable through a [`crate::UnitOfWork`] in the
/// engine, which pairs each of them with a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    user_id: UserId,
    kind: AccountKind,
    balances: BTreeMap<Asset, BalanceEntry>,
    /// Per-asset deposit addresses assigned when the wallet was opened.
    addresses: BTreeMap<Asset, String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// Create an empty wallet.
    #[must_use]
    pub fn new(user_id: UserId, kind: AccountKind) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            kind,
            balances: BTreeMap::new(),
            addresses: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_addresses(mut self, addresses: BTreeMap<Asset, String>) -> Self {
        self.addresses = addresses;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Increase `bucket` of `asset` by `amount`.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if `amount` is not a valid positive amount or
    /// the asset's total would overflow.
    pub fn credit(&mut self, asset: &str, amount: Decimal, bucket: Bucket) -> Result<()> {
        validate_amount(amount)?;
        let current = self.balance(asset);
        let total = current
            .available
            .checked_add(current.locked)
            .and_then(|t| t.checked_add(amount));
        if total.is_none() {
            return Err(RdxError::InvalidAmount {
                reason: format!("crediting {amount} {asset} would overflow the balance"),
            });
        }
        // bucket <= total, so this cannot overflow either.
        let entry = self.balances.entry(asset.to_string()).or_default();
        *entry.get_mut(bucket) += amount;
        self.touch();
        Ok(())
    }

    /// Decrease `bucket` of `asset` by `amount`.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if the bucket holds less than `amount`.
    pub fn debit(&mut self, asset: &str, amount: Decimal, bucket: Bucket) -> Result<()> {
        validate_amount(amount)?;
        let entry = self.entry_with_at_least(asset, amount, bucket)?;
        *entry.get_mut(bucket) -= amount;
        self.touch();
        Ok(())
    }

    /// Reserve funds (available → locked).
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if available < amount.
    pub fn lock(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        self.move_between(asset, amount, Bucket::Available, Bucket::Locked)
    }

    /// Release reserved funds (locked → available).
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if locked < amount.
    pub fn unlock(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        self.move_between(asset, amount, Bucket::Locked, Bucket::Available)
    }

    /// Balance for an asset (zero if never credited).
    #[must_use]
    pub fn balance(&self, asset: &str) -> BalanceEntry {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    /// `available + locked` for an asset.
    #[must_use]
    pub fn total_balance(&self, asset: &str) -> Decimal {
        self.balance(asset).total()
    }

    /// Deposit address for `asset`, if one was assigned.
    #[must_use]
    pub fn address(&self, asset: &str) -> Option<&str> {
        self.addresses.get(asset).map(String::as_str)
    }

    #[must_use]
    pub fn addresses(&self) -> &BTreeMap<Asset, String> {
        &self.addresses
    }

    /// All assets this wallet has ever held.
    #[must_use]
    pub fn balances(&self) -> &BTreeMap<Asset, BalanceEntry> {
        &self.balances
    }

    /// Put an asset's balance back to a previously captured value.
    /// `None` removes the key again (it did not exist before).
    pub(crate) fn restore(&mut self, asset: &str, previous: Option<BalanceEntry>, updated_at: DateTime<Utc>) {
        self.updated_at = updated_at;
        match previous {
            Some(entry) => {
                self.balances.insert(asset.to_string(), entry);
            }
            None => {
                self.balances.remove(asset);
            }
        }
    }

    pub(crate) fn snapshot(&self, asset: &str) -> Option<BalanceEntry> {
        self.balances.get(asset).copied()
    }

    fn move_between(&mut self, asset: &str, amount: Decimal, from: Bucket, to: Bucket) -> Result<()> {
        validate_amount(amount)?;
        let entry = self.entry_with_at_least(asset, amount, from)?;
        *entry.get_mut(from) -= amount;
        *entry.get_mut(to) += amount;
        self.touch();
        Ok(())
    }

    fn entry_with_at_least(
        &mut self,
        asset: &str,
        amount: Decimal,
        bucket: Bucket,
    ) -> Result<&mut BalanceEntry> {
        let held = self.balance(asset).get(bucket);
        if held < amount {
            return Err(RdxError::InsufficientBalance {
                asset: asset.to_string(),
                bucket,
                needed: amount,
                available: held,
            });
        }
        // held >= amount > 0, so the key exists.
        self.balances
            .get_mut(asset)
            .ok_or_else(|| RdxError::Internal(format!("balance for {asset} vanished")))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
