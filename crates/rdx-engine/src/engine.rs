//! The reward engine: owner of every user book and the only writer.
//!
//! ## Locking
//!
//! ```text
//! gate: RwLock<()>          read  → every normal operation
//!                           write → clear_all, verify_supply
//! books: DashMap<UserId, Arc<Mutex<UserBook>>>
//!                           one mutex per user, held for a whole unit of work
//! ```
//!
//! Operations on the same user serialize on that user's mutex; different
//! users never contend. A transfer locks both books in `UserId` order.
//! Books are looked up only after the gate is held, so a purge can never
//! leave an operation holding a book that is no longer in the table.
//! Notifications and price lookups run after every lock is released.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rdx_accounts::{
    Committed, ReferralCodeRegistry, SupplyConservation, UnitOfWork, UserBook, WalletAccount,
};
use rdx_types::{
    AccountKind, AccountingCalendar, Asset, BalanceEntry, EngineConfig, EntryFilter, EntryId,
    LedgerEntry, Notification, Page, Paged, RdxError, Result, UserId,
};
use rust_decimal::Decimal;

use crate::addresses::generate_deposit_addresses;
use crate::collaborators::{NoopNotifier, Notifier, PriceSource, StaticPrices};
use crate::outcome::{Portfolio, PortfolioLine};

pub(crate) type BookHandle = Arc<Mutex<UserBook>>;

/// Balance and rewards accounting engine.
pub struct RewardEngine {
    pub(crate) config: EngineConfig,
    pub(crate) calendar: AccountingCalendar,
    books: DashMap<UserId, BookHandle>,
    /// Which book holds each entry.
    entry_index: DashMap<EntryId, UserId>,
    pub(crate) referral_codes: ReferralCodeRegistry,
    supply: SupplyConservation,
    pub(crate) gate: RwLock<()>,
    notifier: Arc<dyn Notifier>,
    prices: Arc<dyn PriceSource>,
}

impl RewardEngine {
    /// Create an engine with no notifier and an empty price table.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let calendar = config.calendar()?;
        tracing::info!(
            reward_asset = %config.reward_asset,
            assets = config.supported_assets.len(),
            utc_offset_secs = config.accounting_utc_offset_secs,
            "Reward engine initialised"
        );
        Ok(Self {
            config,
            calendar,
            books: DashMap::new(),
            entry_index: DashMap::new(),
            referral_codes: ReferralCodeRegistry::new(),
            supply: SupplyConservation::new(),
            gate: RwLock::new(()),
            notifier: Arc::new(NoopNotifier),
            prices: Arc::new(StaticPrices::new()),
        })
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_price_source(mut self, prices: Arc<dyn PriceSource>) -> Self {
        self.prices = prices;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn calendar(&self) -> AccountingCalendar {
        self.calendar
    }

    // ------------------------------------------------------------------
    // Wallets
    // ------------------------------------------------------------------

    /// Create the user's wallet, or return the existing one.
    ///
    /// A new wallet gets a deposit address for every supported asset except
    /// the reward asset.
    pub fn open_wallet(&self, user: UserId, kind: AccountKind) -> WalletAccount {
        let _gate = self.gate.read();
        let handle = self
            .books
            .entry(user)
            .or_insert_with(|| {
                let addresses =
                    generate_deposit_addresses(&self.config.supported_assets, &self.config.reward_asset);
                tracing::info!(user = %user, kind = ?kind, addresses = addresses.len(), "Wallet opened");
                Arc::new(Mutex::new(
                    UserBook::new(user, kind, self.config.deposit_dedup_capacity).with_addresses(addresses),
                ))
            })
            .clone();
        handle.lock().wallet().clone()
    }

    /// Per-asset deposit addresses assigned when the wallet was opened.
    ///
    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn deposit_addresses(&self, user: UserId) -> Result<BTreeMap<Asset, String>> {
        self.read_book(user, |book| book.wallet().addresses().clone())
    }

    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn wallet(&self, user: UserId) -> Result<WalletAccount> {
        self.read_book(user, |book| book.wallet().clone())
    }

    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn balance(&self, user: UserId, asset: &str) -> Result<BalanceEntry> {
        self.read_book(user, |book| book.wallet().balance(asset))
    }

    /// `available + locked`.
    ///
    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn total_balance(&self, user: UserId, asset: &str) -> Result<Decimal> {
        self.read_book(user, |book| book.wallet().total_balance(asset))
    }

    #[must_use]
    pub fn has_wallet(&self, user: UserId) -> bool {
        self.books.contains_key(&user)
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.books.len()
    }

    // ------------------------------------------------------------------
    // Ledger queries
    // ------------------------------------------------------------------

    /// # Errors
    /// `EntryNotFound` for unknown ids.
    pub fn entry(&self, id: EntryId) -> Result<LedgerEntry> {
        let owner = self.owner_of(id)?;
        self.read_book(owner, |book| book.ledger().get(id).cloned())?
            .ok_or(RdxError::EntryNotFound(id))
    }

    /// The user's entries matching `filter`, newest first.
    ///
    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn history(&self, user: UserId, filter: &EntryFilter, page: Page) -> Result<Paged<LedgerEntry>> {
        self.read_book(user, |book| book.ledger().list_for_user(user, filter, page))
    }

    // ------------------------------------------------------------------
    // Reconciliation & admin
    // ------------------------------------------------------------------

    /// Check that the user's wallet totals equal their completed ledger deltas.
    ///
    /// # Errors
    /// `LedgerDrift` on mismatch, `WalletNotFound` for unknown users.
    pub fn verify_user(&self, user: UserId) -> Result<()> {
        self.read_book(user, UserBook::reconcile)?
    }

    /// Check Σ wallet totals across all users against recorded inflows and
    /// outflows. Blocks every other operation while it runs.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` on mismatch.
    pub fn verify_supply(&self, asset: &str) -> Result<()> {
        let _gate = self.gate.write();
        let actual = self
            .books
            .iter()
            .try_fold(Decimal::ZERO, |sum, handle| {
                sum.checked_add(handle.value().lock().wallet().total_balance(asset))
            })
            .ok_or_else(|| RdxError::SupplyInvariantViolation {
                reason: format!("Asset {asset}: wallet totals overflow"),
            });
        actual.and_then(|actual| self.supply.verify(asset, actual)).inspect_err(|e| {
            tracing::error!(asset, error = %e, "Supply conservation violated");
        })
    }

    /// [`Self::verify_supply`] for every asset with recorded flows.
    ///
    /// # Errors
    /// The first `SupplyInvariantViolation` found.
    pub fn verify_all_supply(&self) -> Result<()> {
        for asset in self.supply.tracked_assets() {
            self.verify_supply(&asset)?;
        }
        Ok(())
    }

    /// Development-only purge of every collection, all together.
    pub fn clear_all(&self) {
        let _gate = self.gate.write();
        let users = self.books.len();
        let entries = self.entry_index.len();
        self.books.clear();
        self.entry_index.clear();
        self.referral_codes.clear();
        self.supply.clear();
        tracing::warn!(users, entries, "All accounting state cleared");
    }

    // ------------------------------------------------------------------
    // Valuation
    // ------------------------------------------------------------------

    /// Balances with display values from the price source.
    ///
    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn portfolio(&self, user: UserId) -> Result<Portfolio> {
        let balances = self.read_book(user, |book| book.wallet().balances().clone())?;
        // No locks held from here on.
        let mut total_value = Decimal::ZERO;
        let lines = balances
            .into_iter()
            .map(|(asset, balance)| {
                let price = match self.prices.price(&asset) {
                    Ok(price) => price,
                    Err(e) => {
                        tracing::warn!(asset = %asset, error = %e, "Price lookup failed");
                        None
                    }
                };
                let value = price.map(|p| p * balance.total());
                total_value += value.unwrap_or_default();
                PortfolioLine {
                    asset,
                    balance,
                    price,
                    value,
                }
            })
            .collect();
        Ok(Portfolio {
            user_id: user,
            lines,
            total_value,
        })
    }

    // ------------------------------------------------------------------
    // Internals shared by the operation modules
    // ------------------------------------------------------------------

    pub(crate) fn handle(&self, user: UserId) -> Result<BookHandle> {
        self.books
            .get(&user)
            .map(|h| Arc::clone(h.value()))
            .ok_or(RdxError::WalletNotFound(user))
    }

    pub(crate) fn owner_of(&self, id: EntryId) -> Result<UserId> {
        self.entry_index
            .get(&id)
            .map(|owner| *owner)
            .ok_or(RdxError::EntryNotFound(id))
    }

    /// Run `f` on the user's book under the shared gate.
    pub(crate) fn read_book<T>(&self, user: UserId, f: impl FnOnce(&UserBook) -> T) -> Result<T> {
        let _gate = self.gate.read();
        let handle = self.handle(user)?;
        let book = handle.lock();
        Ok(f(&book))
    }

    /// Run a unit of work named `op` on the user's book.
    ///
    /// `f` mutates through the unit; on `Ok` the unit is checked, its supply
    /// deltas recorded, and then committed, all while the book is still
    /// locked. On `Err` the unit drops and rolls back.
    pub(crate) fn write_book<T>(
        &self,
        op: &'static str,
        user: UserId,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    ) -> Result<T> {
        let result: Result<T> = (|| {
            let _gate = self.gate.read();
            let handle = self.handle(user)?;
            let mut book = handle.lock();
            let mut uow = UnitOfWork::begin(&mut book, op);
            let value = f(&mut uow)?;
            let committed = self.commit_units(vec![(user, uow)])?;
            self.publish(&committed);
            Ok(value)
        })();
        self.finish(op, user, result)
    }

    /// Check every unit, record their supply deltas together, then commit
    /// them all. Nothing commits unless every unit passes and the supply
    /// counters have room.
    pub(crate) fn commit_units(
        &self,
        units: Vec<(UserId, UnitOfWork<'_>)>,
    ) -> Result<Vec<(UserId, Committed)>> {
        let mut deltas = Vec::new();
        for (_, uow) in &units {
            uow.check()?;
            deltas.extend_from_slice(uow.supply_deltas());
        }
        self.supply.record_all(&deltas)?;
        let mut committed = Vec::with_capacity(units.len());
        for (user, uow) in units {
            // The same check already passed above.
            match uow.commit() {
                Ok(c) => committed.push((user, c)),
                Err(err) => {
                    self.supply.unrecord_all(&deltas);
                    return Err(err);
                }
            }
        }
        Ok(committed)
    }

    /// Index the entries of committed units by owner.
    pub(crate) fn publish(&self, committed: &[(UserId, Committed)]) {
        for (user, unit) in committed {
            for id in &unit.entries {
                self.entry_index.insert(*id, *user);
            }
        }
    }

    /// Log a failed operation. Internal errors are logged in full and
    /// replaced by an opaque one.
    pub(crate) fn finish<T>(&self, op: &'static str, user: UserId, result: Result<T>) -> Result<T> {
        result.map_err(|err| {
            if err.is_internal() {
                tracing::error!(op, user = %user, error = %err, "Operation aborted");
                RdxError::Internal(format!("{op} aborted"))
            } else if err.is_user_correctable() {
                tracing::info!(op, user = %user, error = %err, "Operation rejected");
                err
            } else {
                tracing::warn!(op, user = %user, error = %err, "Operation failed");
                err
            }
        })
    }

    /// Best-effort delivery; failures are logged and dropped.
    pub(crate) fn notify(&self, notification: Notification) {
        let user = notification.user_id;
        if let Err(e) = self.notifier.notify(notification) {
            tracing::warn!(user = %user, error = %e, "Notification dropped");
        }
    }
}

impl std::fmt::Debug for RewardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardEngine")
            .field("users", &self.books.len())
            .field("entries", &self.entry_index.len())
            .field("reward_asset", &self.config.reward_asset)
            .finish_non_exhaustive()
    }
}
