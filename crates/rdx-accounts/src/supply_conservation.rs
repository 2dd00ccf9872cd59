//! Supply conservation and per-user reconciliation.
//!
//! Two invariants are checked here:
//! ```text
//! ∀ user, asset: Σ(completed ledger deltas) == available + locked
//! ∀ asset:       Σ(available + locked over all users) == Σ(inflows) - Σ(outflows)
//! ```
//! Inflows and outflows are fed from every committed unit of work, so the
//! second check catches a wallet mutated outside the ledger-append protocol.

use dashmap::DashMap;
use rdx_types::{Asset, RdxError, Result};
use rust_decimal::Decimal;

use crate::{LedgerStore, WalletAccount};

/// Per-asset supply counters. Safe to update from many threads.
#[derive(Debug, Default)]
pub struct SupplyConservation {
    inflows: DashMap<Asset, Decimal>,
    outflows: DashMap<Asset, Decimal>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a balance delta about to be committed.
    ///
    /// # Errors
    /// Returns `InvalidAmount` (and records nothing) if the inflow or
    /// outflow counter would overflow.
    pub fn record(&self, asset: &str, delta: Decimal) -> Result<()> {
        let (counters, magnitude) = if delta > Decimal::ZERO {
            (&self.inflows, delta)
        } else if delta < Decimal::ZERO {
            (&self.outflows, -delta)
        } else {
            return Ok(());
        };
        let mut total = counters.entry(asset.to_string()).or_default();
        *total = total.checked_add(magnitude).ok_or_else(|| RdxError::InvalidAmount {
            reason: format!("{asset} supply counters would overflow"),
        })?;
        Ok(())
    }

    /// Record every delta of a unit, or none of them.
    ///
    /// # Errors
    /// The first overflow from [`Self::record`]; deltas already recorded by
    /// this call are taken back.
    pub fn record_all(&self, deltas: &[(Asset, Decimal)]) -> Result<()> {
        for (done, (asset, delta)) in deltas.iter().enumerate() {
            if let Err(err) = self.record(asset, *delta) {
                self.unrecord_all(&deltas[..done]);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Take back deltas recorded with [`Self::record_all`].
    pub fn unrecord_all(&self, deltas: &[(Asset, Decimal)]) {
        for (asset, delta) in deltas {
            let (counters, magnitude) = if *delta > Decimal::ZERO {
                (&self.inflows, *delta)
            } else {
                (&self.outflows, -*delta)
            };
            if let Some(mut total) = counters.get_mut(asset.as_str()) {
                // Recorded earlier, so total >= magnitude.
                *total -= magnitude;
            }
        }
    }

    #[must_use]
    pub fn total_inflows(&self, asset: &str) -> Decimal {
        self.inflows.get(asset).map_or(Decimal::ZERO, |v| *v)
    }

    #[must_use]
    pub fn total_outflows(&self, asset: &str) -> Decimal {
        self.outflows.get(asset).map_or(Decimal::ZERO, |v| *v)
    }

    /// Inflows minus outflows.
    #[must_use]
    pub fn expected_supply(&self, asset: &str) -> Decimal {
        self.total_inflows(asset) - self.total_outflows(asset)
    }

    /// Compare `actual_supply` (Σ wallet totals) with the expected supply.
    ///
    /// # Errors
    /// Returns [`RdxError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, asset: &str, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(RdxError::SupplyInvariantViolation {
                reason: format!(
                    "Asset {asset}: actual supply {actual_supply} != expected {expected} \
                     (inflows={}, outflows={})",
                    self.total_inflows(asset),
                    self.total_outflows(asset),
                ),
            });
        }
        Ok(())
    }

    /// All assets with recorded flows, sorted.
    #[must_use]
    pub fn tracked_assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .inflows
            .iter()
            .chain(self.outflows.iter())
            .map(|e| e.key().clone())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    pub fn clear(&self) {
        self.inflows.clear();
        self.outflows.clear();
    }
}

/// Check that every asset's wallet total equals the sum of the user's
/// completed ledger deltas.
///
/// # Errors
/// Returns [`RdxError::LedgerDrift`] for the first asset that disagrees.
pub fn reconcile_wallet(wallet: &WalletAccount, ledger: &LedgerStore) -> Result<()> {
    let user = wallet.user_id();
    let ledger_totals = ledger.completed_deltas(user)?;

    let mut assets: Vec<&str> = ledger_totals.keys().map(String::as_str).collect();
    assets.extend(wallet.balances().keys().map(String::as_str));
    assets.sort_unstable();
    assets.dedup();

    for asset in assets {
        let from_ledger = ledger_totals.get(asset).copied().unwrap_or_default();
        let in_wallet = wallet.total_balance(asset);
        if from_ledger != in_wallet {
            return Err(RdxError::LedgerDrift {
                user,
                asset: asset.to_string(),
                ledger: from_ledger,
                wallet: in_wallet,
            });
        }
    }
    Ok(())
}
