//! Unit of work over one [`UserBook`].
//!
//! Every mutation made through a [`UnitOfWork`] pushes an undo action. On
//! [`UnitOfWork::commit`] the undo log is discarded; if the unit is dropped
//! without committing (an error was propagated with `?`, or commit itself
//! refused), the log is replayed in reverse and the book is exactly as it
//! was before [`UnitOfWork::begin`].
//!
//! Commit also enforces the ledger-append protocol: for each asset, the
//! change in wallet total must equal the sum of completed ledger deltas
//! written in the same unit, and no wallet mutation may happen without a
//! ledger write.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rdx_types::{
    Asset, BalanceEntry, Bucket, CheckIn, EntryId, EntryStatus, LedgerEntry, RdxError,
    ReferralCode, Result, UserId,
};
use rust_decimal::Decimal;

use crate::{ReferralLedger, UserBook};

enum Undo {
    Balance {
        asset: Asset,
        previous: Option<BalanceEntry>,
        updated_at: DateTime<Utc>,
    },
    Appended(EntryId),
    Status(Box<LedgerEntry>),
    CheckIn(NaiveDate),
    Referral(Option<Box<ReferralLedger>>),
    DepositRef(String),
}

/// What a committed unit changed, for the caller's global indexes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Committed {
    /// Entries appended, in order.
    pub entries: Vec<EntryId>,
    /// Completed balance deltas (asset, delta) written by the unit.
    pub supply_deltas: Vec<(Asset, Decimal)>,
}

/// An open transaction over one user's book.
pub struct UnitOfWork<'a> {
    book: &'a mut UserBook,
    op: &'static str,
    undo: Vec<Undo>,
    committed: Committed,
    /// Wallet total per asset when the unit first touched it.
    opening_totals: BTreeMap<Asset, Decimal>,
    wallet_mutations: usize,
    ledger_writes: usize,
    referral_snapshotted: bool,
    done: bool,
}

impl<'a> UnitOfWork<'a> {
    /// Open a unit of work named `op` (used in logs).
    pub fn begin(book: &'a mut UserBook, op: &'static str) -> Self {
        Self {
            book,
            op,
            undo: Vec::new(),
            committed: Committed::default(),
            opening_totals: BTreeMap::new(),
            wallet_mutations: 0,
            ledger_writes: 0,
            referral_snapshotted: false,
            done: false,
        }
    }

    #[must_use]
    pub fn book(&self) -> &UserBook {
        &*self.book
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.book.user_id()
    }

    /// Completed balance deltas written so far, in order.
    #[must_use]
    pub fn supply_deltas(&self) -> &[(Asset, Decimal)] {
        &self.committed.supply_deltas
    }

    // -- wallet ------------------------------------------------------------

    /// # Errors
    /// See [`crate::WalletAccount::credit`].
    pub fn credit(&mut self, asset: &str, amount: Decimal, bucket: Bucket) -> Result<()> {
        let previous = self.touch(asset);
        self.book.wallet.credit(asset, amount, bucket)?;
        self.wallet_changed(asset, previous);
        Ok(())
    }

    /// # Errors
    /// See [`crate::WalletAccount::debit`].
    pub fn debit(&mut self, asset: &str, amount: Decimal, bucket: Bucket) -> Result<()> {
        let previous = self.touch(asset);
        self.book.wallet.debit(asset, amount, bucket)?;
        self.wallet_changed(asset, previous);
        Ok(())
    }

    /// # Errors
    /// See [`crate::WalletAccount::lock`].
    pub fn lock(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        let previous = self.touch(asset);
        self.book.wallet.lock(asset, amount)?;
        self.wallet_changed(asset, previous);
        Ok(())
    }

    /// # Errors
    /// See [`crate::WalletAccount::unlock`].
    pub fn unlock(&mut self, asset: &str, amount: Decimal) -> Result<()> {
        let previous = self.touch(asset);
        self.book.wallet.unlock(asset, amount)?;
        self.wallet_changed(asset, previous);
        Ok(())
    }

    // -- ledger ------------------------------------------------------------

    /// Append an entry to the user's ledger.
    ///
    /// # Errors
    /// - `Internal` if the entry belongs to another user
    /// - `DuplicateEntry` from the store
    pub fn append(&mut self, entry: LedgerEntry) -> Result<EntryId> {
        if entry.user_id != self.user_id() {
            return Err(RdxError::Internal(format!(
                "{}: entry for {} appended to book of {}",
                self.op,
                entry.user_id,
                self.user_id()
            )));
        }
        let completed = entry.is_completed().then(|| (entry.asset.clone(), entry.balance_delta()));
        let id = self.book.ledger.append(entry)?;
        self.undo.push(Undo::Appended(id));
        self.committed.entries.push(id);
        if let Some(delta) = completed {
            self.committed.supply_deltas.push(delta);
        }
        self.ledger_writes += 1;
        Ok(id)
    }

    /// Move an entry out of `pending`. Returns the updated entry.
    ///
    /// # Errors
    /// `EntryNotFound` / `InvalidTransition` from the store.
    pub fn transition(&mut self, id: EntryId, status: EntryStatus) -> Result<LedgerEntry> {
        let before = self
            .book
            .ledger
            .get(id)
            .cloned()
            .ok_or(RdxError::EntryNotFound(id))?;
        let after = self.book.ledger.update_status(id, status)?.clone();
        self.undo.push(Undo::Status(Box::new(before)));
        if after.is_completed() {
            self.committed
                .supply_deltas
                .push((after.asset.clone(), after.balance_delta()));
        }
        self.ledger_writes += 1;
        Ok(after)
    }

    // -- rewards -----------------------------------------------------------

    /// # Errors
    /// `AlreadyCheckedIn` / `StaleCheckIn` from the tracker.
    pub fn record_check_in(&mut self, check_in: CheckIn) -> Result<()> {
        let day = check_in.day;
        self.book.streak.record(check_in)?;
        self.undo.push(Undo::CheckIn(day));
        Ok(())
    }

    /// The user's referral ledger, created with `code` if missing.
    pub fn referral_mut(&mut self, code: ReferralCode) -> &mut ReferralLedger {
        if !self.referral_snapshotted {
            let snapshot = self.book.referral.clone().map(Box::new);
            self.undo.push(Undo::Referral(snapshot));
            self.referral_snapshotted = true;
        }
        let user = self.user_id();
        self.book
            .referral
            .get_or_insert_with(|| ReferralLedger::new(user, code))
    }

    /// # Errors
    /// `DuplicateDeposit` if the reference was already reported.
    pub fn remember_deposit(&mut self, reference: &str) -> Result<()> {
        self.book.deposit_refs.mark_seen(reference)?;
        self.undo.push(Undo::DepositRef(reference.to_string()));
        Ok(())
    }

    // -- completion --------------------------------------------------------

    /// Keep every change.
    ///
    /// # Errors
    /// Returns `Internal` (and rolls back) if the wallet changed in a way the
    /// ledger writes of this unit do not explain.
    pub fn commit(mut self) -> Result<Committed> {
        self.check()?;
        self.done = true;
        tracing::debug!(
            user = %self.user_id(),
            op = self.op,
            entries = self.committed.entries.len(),
            "Unit of work committed"
        );
        Ok(std::mem::take(&mut self.committed))
    }

    /// Run the commit-time protocol check without committing. Lets a caller
    /// holding several units validate all of them before committing any.
    ///
    /// # Errors
    /// Returns `Internal` describing the unexplained wallet change.
    pub fn check(&self) -> Result<()> {
        if self.wallet_mutations > 0 && self.ledger_writes == 0 {
            return Err(RdxError::Internal(format!(
                "{}: wallet mutated without a ledger entry",
                self.op
            )));
        }
        let mut explained: BTreeMap<&str, Decimal> = BTreeMap::new();
        for (asset, delta) in &self.committed.supply_deltas {
            let sum = explained.entry(asset.as_str()).or_default();
            *sum = sum.checked_add(*delta).ok_or_else(|| {
                RdxError::Internal(format!("{}: {asset} deltas overflowed", self.op))
            })?;
        }
        for (asset, opening) in &self.opening_totals {
            let changed = self.book.wallet.total_balance(asset) - *opening;
            let expected = explained.remove(asset.as_str()).unwrap_or_default();
            if changed != expected {
                return Err(RdxError::Internal(format!(
                    "{}: {asset} wallet total moved by {changed}, ledger explains {expected}",
                    self.op
                )));
            }
        }
        if let Some((asset, delta)) = explained.into_iter().find(|(_, d)| !d.is_zero()) {
            return Err(RdxError::Internal(format!(
                "{}: completed {asset} delta {delta} with no wallet change",
                self.op
            )));
        }
        Ok(())
    }

    fn touch(&mut self, asset: &str) -> (Option<BalanceEntry>, DateTime<Utc>) {
        let previous = self.book.wallet.snapshot(asset);
        self.opening_totals
            .entry(asset.to_string())
            .or_insert_with(|| previous.map_or(Decimal::ZERO, |b| b.total()));
        (previous, self.book.wallet.updated_at())
    }

    fn wallet_changed(&mut self, asset: &str, (previous, updated_at): (Option<BalanceEntry>, DateTime<Utc>)) {
        self.undo.push(Undo::Balance {
            asset: asset.to_string(),
            previous,
            updated_at,
        });
        self.wallet_mutations += 1;
    }

    fn rollback(&mut self) {
        let undone = self.undo.len();
        while let Some(action) = self.undo.pop() {
            match action {
                Undo::Balance {
                    asset,
                    previous,
                    updated_at,
                } => self.book.wallet.restore(&asset, previous, updated_at),
                Undo::Appended(id) => self.book.ledger.discard(id),
                Undo::Status(entry) => self.book.ledger.restore(*entry),
                Undo::CheckIn(day) => self.book.streak.forget(day),
                Undo::Referral(snapshot) => self.book.referral = snapshot.map(|b| *b),
                Undo::DepositRef(reference) => self.book.deposit_refs.forget(&reference),
            }
        }
        if undone > 0 {
            tracing::warn!(user = %self.user_id(), op = self.op, undone, "Unit of work rolled back");
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.rollback();
        }
    }
}
