//! Everything the engine keeps for one user.

use std::collections::BTreeMap;

use rdx_types::{AccountKind, Asset, Result, UserId};

use crate::{IdempotencyGuard, LedgerStore, ReferralLedger, StreakTracker, WalletAccount, reconcile_wallet};

/// A user's wallet, ledger, check-in history, referral ledger and seen
/// deposit references.
///
/// Read access is public. Writes go through [`crate::UnitOfWork`].
#[derive(Debug, Clone)]
pub struct UserBook {
    pub(crate) wallet: WalletAccount,
    pub(crate) ledger: LedgerStore,
    pub(crate) streak: StreakTracker,
    pub(crate) referral: Option<ReferralLedger>,
    pub(crate) deposit_refs: IdempotencyGuard,
}

impl UserBook {
    #[must_use]
    pub fn new(user_id: UserId, kind: AccountKind, deposit_dedup_capacity: usize) -> Self {
        Self {
            wallet: WalletAccount::new(user_id, kind),
            ledger: LedgerStore::new(),
            streak: StreakTracker::new(user_id),
            referral: None,
            deposit_refs: IdempotencyGuard::new(deposit_dedup_capacity),
        }
    }

    /// Attach per-asset deposit addresses to the wallet.
    #[must_use]
    pub fn with_addresses(mut self, addresses: BTreeMap<Asset, String>) -> Self {
        self.wallet = self.wallet.with_addresses(addresses);
        self
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.wallet.user_id()
    }

    #[must_use]
    pub fn wallet(&self) -> &WalletAccount {
        &self.wallet
    }

    #[must_use]
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    #[must_use]
    pub fn streak(&self) -> &StreakTracker {
        &self.streak
    }

    /// `None` until the referral ledger is first accessed.
    #[must_use]
    pub fn referral(&self) -> Option<&ReferralLedger> {
        self.referral.as_ref()
    }

    #[must_use]
    pub fn deposit_refs(&self) -> &IdempotencyGuard {
        &self.deposit_refs
    }

    /// Wallet totals agree with completed ledger deltas.
    ///
    /// # Errors
    /// Returns `LedgerDrift` for the first asset that disagrees.
    pub fn reconcile(&self) -> Result<()> {
        reconcile_wallet(&self.wallet, &self.ledger)
    }
}
