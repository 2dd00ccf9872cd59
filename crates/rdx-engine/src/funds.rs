//! Deposits, withdrawals, transfers, trades and compensating entries.
//!
//! ```text
//! deposit (pending) ──confirm──▶ completed + credit
//!                   └─reject───▶ failed
//!
//! request_withdrawal: lock amount+fee, pending entry
//!   ├─complete──▶ completed + debit locked
//!   ├─fail──────▶ failed    + unlock
//!   └─cancel────▶ cancelled + unlock   (owner only)
//! ```

use rdx_types::{
    Bucket, EntryId, EntryKind, EntryStatus, LedgerEntry, NotificationCategory, Notification,
    RdxError, Result, UserId, validate_amount,
};
use rust_decimal::Decimal;

use crate::engine::RewardEngine;
use crate::outcome::TransferReceipt;
use crate::request::{DepositRequest, WithdrawalRequest};
use rdx_accounts::UnitOfWork;

impl RewardEngine {
    // ------------------------------------------------------------------
    // Deposits
    // ------------------------------------------------------------------

    /// Record a deposit. Completed deposits are credited immediately.
    ///
    /// Without an explicit `to_address` the entry names the wallet's own
    /// deposit address for the asset, if it has one.
    ///
    /// # Errors
    /// - `InvalidAmount` / `UnsupportedAsset` before anything is touched
    /// - `DuplicateDeposit` if `reference` was already reported by this user
    /// - `WalletNotFound` for unknown users
    pub fn deposit(&self, request: DepositRequest) -> Result<LedgerEntry> {
        let user = request.user_id;
        self.finish("deposit", user, self.check_asset_amount(&request.asset, request.amount))?;

        let status = if request.pending {
            EntryStatus::Pending
        } else {
            EntryStatus::Completed
        };
        let mut entry = LedgerEntry::new(user, EntryKind::Deposit, &request.asset, request.amount, status)
            .with_description(format!("Deposit {} {}", request.amount, request.asset));
        if let Some(reference) = &request.reference {
            entry = entry.with_meta("reference", reference.as_str());
        }
        if let Some(from) = &request.from_address {
            entry = entry.with_meta("from_address", from.as_str());
        }

        let entry = self.write_book("deposit", user, |uow| {
            if let Some(reference) = &request.reference {
                uow.remember_deposit(reference)?;
            }
            let to = request
                .to_address
                .as_deref()
                .or_else(|| uow.book().wallet().address(&request.asset));
            if let Some(to) = to {
                entry = entry.with_meta("to_address", to);
            }
            uow.append(entry.clone())?;
            if !request.pending {
                uow.credit(&request.asset, request.amount, Bucket::Available)?;
            }
            Ok(entry)
        })?;

        tracing::info!(
            user = %user,
            entry = %entry.id,
            asset = %entry.asset,
            amount = %entry.amount,
            status = %entry.status,
            "Deposit recorded"
        );
        if entry.is_completed() {
            self.notify_deposit(&entry);
        }
        Ok(entry)
    }

    /// Credit a pending deposit and complete its entry.
    ///
    /// # Errors
    /// `EntryNotFound`, `EntryNotEligible` (not a deposit), `InvalidTransition`.
    pub fn confirm_deposit(&self, id: EntryId) -> Result<LedgerEntry> {
        let user = self.owner_of(id)?;
        let entry = self.write_book("confirm_deposit", user, |uow| {
            expect_kind(uow, id, EntryKind::Deposit)?;
            let entry = uow.transition(id, EntryStatus::Completed)?;
            uow.credit(&entry.asset, entry.balance_delta(), Bucket::Available)?;
            Ok(entry)
        })?;
        tracing::info!(user = %user, entry = %id, amount = %entry.amount, "Deposit confirmed");
        self.notify_deposit(&entry);
        Ok(entry)
    }

    /// Mark a pending deposit as failed. Nothing was credited, so nothing moves.
    ///
    /// # Errors
    /// `EntryNotFound`, `EntryNotEligible` (not a deposit), `InvalidTransition`.
    pub fn reject_deposit(&self, id: EntryId, reason: &str) -> Result<LedgerEntry> {
        let user = self.owner_of(id)?;
        let entry = self.write_book("reject_deposit", user, |uow| {
            expect_kind(uow, id, EntryKind::Deposit)?;
            uow.transition(id, EntryStatus::Failed)
        })?;
        tracing::info!(user = %user, entry = %id, reason, "Deposit rejected");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Withdrawals
    // ------------------------------------------------------------------

    /// Lock `amount + fee` and append a pending withdrawal.
    ///
    /// # Errors
    /// - `InvalidAmount` / `UnsupportedAsset` before anything is touched
    /// - `InsufficientBalance` if available < amount + fee
    pub fn request_withdrawal(&self, request: WithdrawalRequest) -> Result<LedgerEntry> {
        let user = request.user_id;
        self.finish("request_withdrawal", user, self.check_withdrawal(&request))?;

        let reserved = request.reserved();
        let entry = LedgerEntry::new(
            user,
            EntryKind::Withdrawal,
            &request.asset,
            -request.amount,
            EntryStatus::Pending,
        )
        .with_fee(request.fee)
        .with_description(format!("Withdraw {} {}", request.amount, request.asset))
        .with_meta("destination", request.destination.as_str());

        let entry = self.write_book("request_withdrawal", user, |uow| {
            uow.append(entry.clone())?;
            uow.lock(&request.asset, reserved)?;
            Ok(entry)
        })?;
        tracing::info!(
            user = %user,
            entry = %entry.id,
            asset = %entry.asset,
            reserved = %reserved,
            "Withdrawal requested"
        );
        Ok(entry)
    }

    /// Settle a pending withdrawal: the locked funds leave the wallet.
    ///
    /// # Errors
    /// `EntryNotFound`, `EntryNotEligible`, `InvalidTransition`.
    pub fn complete_withdrawal(&self, id: EntryId) -> Result<LedgerEntry> {
        let entry = self.resolve_withdrawal("complete_withdrawal", id, EntryStatus::Completed, None)?;
        self.notify(Notification::new(
            entry.user_id,
            "Withdrawal Completed",
            format!("Your withdrawal of {} {} has been sent", -entry.amount, entry.asset),
            NotificationCategory::Transaction,
        ));
        Ok(entry)
    }

    /// Settlement failed: release the locked funds.
    ///
    /// # Errors
    /// `EntryNotFound`, `EntryNotEligible`, `InvalidTransition`.
    pub fn fail_withdrawal(&self, id: EntryId, reason: &str) -> Result<LedgerEntry> {
        let entry = self.resolve_withdrawal("fail_withdrawal", id, EntryStatus::Failed, None)?;
        tracing::warn!(user = %entry.user_id, entry = %id, reason, "Withdrawal failed");
        self.notify(Notification::new(
            entry.user_id,
            "Withdrawal Failed",
            format!(
                "Your withdrawal of {} {} failed and the funds were returned: {reason}",
                -entry.amount, entry.asset
            ),
            NotificationCategory::Transaction,
        ));
        Ok(entry)
    }

    /// The owner withdraws the request before settlement.
    ///
    /// # Errors
    /// `EntryNotFound` (also when `user` is not the owner), `EntryNotEligible`,
    /// `InvalidTransition`.
    pub fn cancel_withdrawal(&self, user: UserId, id: EntryId) -> Result<LedgerEntry> {
        self.resolve_withdrawal("cancel_withdrawal", id, EntryStatus::Cancelled, Some(user))
    }

    fn resolve_withdrawal(
        &self,
        op: &'static str,
        id: EntryId,
        target: EntryStatus,
        owner: Option<UserId>,
    ) -> Result<LedgerEntry> {
        let user = self.owner_of(id)?;
        if owner.is_some_and(|o| o != user) {
            return Err(RdxError::EntryNotFound(id));
        }
        let entry = self.write_book(op, user, |uow| {
            expect_kind(uow, id, EntryKind::Withdrawal)?;
            let entry = uow.transition(id, target)?;
            let reserved = -entry.amount + entry.fee;
            if target == EntryStatus::Completed {
                uow.debit(&entry.asset, reserved, Bucket::Locked)?;
            } else {
                uow.unlock(&entry.asset, reserved)?;
            }
            Ok(entry)
        })?;
        tracing::info!(user = %user, entry = %id, status = %entry.status, "Withdrawal resolved");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Transfers & trades
    // ------------------------------------------------------------------

    /// Move `amount` of `asset` from one user's available balance to another's.
    ///
    /// # Errors
    /// - `InvalidAmount` / `UnsupportedAsset`, or sender == receiver
    /// - `WalletNotFound` for either user
    /// - `InsufficientBalance` if the sender is short
    pub fn transfer(&self, from: UserId, to: UserId, asset: &str, amount: Decimal) -> Result<TransferReceipt> {
        let result: Result<TransferReceipt> = (|| {
            self.check_asset_amount(asset, amount)?;
            if from == to {
                return Err(RdxError::InvalidAmount {
                    reason: "sender and receiver are the same user".into(),
                });
            }
            let transfer_id = EntryId::new().0.to_string();
            let outgoing = LedgerEntry::new(from, EntryKind::Transfer, asset, -amount, EntryStatus::Completed)
                .with_description(format!("Transfer {amount} {asset} to {to}"))
                .with_meta("transfer_id", transfer_id.as_str())
                .with_meta("counterparty", to.to_string());
            let incoming = LedgerEntry::new(to, EntryKind::Transfer, asset, amount, EntryStatus::Completed)
                .with_description(format!("Transfer {amount} {asset} from {from}"))
                .with_meta("transfer_id", transfer_id.as_str())
                .with_meta("counterparty", from.to_string());

            let _gate = self.gate.read();
            let from_handle = self.handle(from)?;
            let to_handle = self.handle(to)?;
            let (mut from_book, mut to_book) = if from < to {
                let f = from_handle.lock();
                let t = to_handle.lock();
                (f, t)
            } else {
                let t = to_handle.lock();
                let f = from_handle.lock();
                (f, t)
            };
            let mut out = UnitOfWork::begin(&mut from_book, "transfer_out");
            let mut inc = UnitOfWork::begin(&mut to_book, "transfer_in");
            out.append(outgoing.clone())?;
            out.debit(asset, amount, Bucket::Available)?;
            inc.append(incoming.clone())?;
            inc.credit(asset, amount, Bucket::Available)?;
            let committed = self.commit_units(vec![(from, out), (to, inc)])?;
            self.publish(&committed);
            Ok(TransferReceipt { outgoing, incoming })
        })();
        let receipt = self.finish("transfer", from, result)?;

        tracing::info!(
            from = %from,
            to = %to,
            asset,
            amount = %amount,
            "Transfer completed"
        );
        self.notify(Notification::new(
            to,
            "Transfer Received",
            format!("You received {amount} {asset} from {from}"),
            NotificationCategory::Transaction,
        ));
        Ok(receipt)
    }

    /// Account for a trade fill reported by the matching venue.
    ///
    /// `amount` is signed from the user's side (bought asset positive, paid
    /// asset negative); `fee` is charged on top.
    ///
    /// # Errors
    /// `InvalidAmount` / `UnsupportedAsset`, `InsufficientBalance` if the
    /// user cannot cover a negative delta.
    pub fn record_trade(
        &self,
        user: UserId,
        asset: &str,
        amount: Decimal,
        fee: Decimal,
        reference: &str,
    ) -> Result<LedgerEntry> {
        let valid = check_fee(fee).and_then(|()| self.check_asset_amount(asset, amount.abs()));
        self.finish("record_trade", user, valid)?;
        let entry = LedgerEntry::new(user, EntryKind::Trade, asset, amount, EntryStatus::Completed)
            .with_fee(fee)
            .with_description(format!("Trade {amount} {asset}"))
            .with_meta("reference", reference);
        let delta = entry.balance_delta();

        let entry = self.write_book("record_trade", user, |uow| {
            uow.append(entry.clone())?;
            apply_delta(uow, asset, delta)?;
            Ok(entry)
        })?;
        tracing::info!(user = %user, entry = %entry.id, asset, delta = %delta, "Trade recorded");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Corrections
    // ------------------------------------------------------------------

    /// Reverse a completed entry by appending one with the opposite delta.
    ///
    /// # Errors
    /// - `EntryNotFound`
    /// - `EntryNotEligible` if the entry is not completed, is itself a
    ///   compensation, was already compensated, or moved no balance
    /// - `InsufficientBalance` if reversing a credit the user already spent
    pub fn post_compensation(&self, id: EntryId, reason: &str) -> Result<LedgerEntry> {
        let user = self.owner_of(id)?;
        let id_text = id.to_string();
        let entry = self.write_book("post_compensation", user, |uow| {
            let original = uow
                .book()
                .ledger()
                .get(id)
                .cloned()
                .ok_or(RdxError::EntryNotFound(id))?;
            let not_eligible = |why: &str| RdxError::EntryNotEligible {
                entry: id,
                reason: why.to_string(),
            };
            if !original.is_completed() {
                return Err(not_eligible("only completed entries can be compensated"));
            }
            if original.meta("compensates").is_some() {
                return Err(not_eligible("entry is itself a compensation"));
            }
            let already = uow
                .book()
                .ledger()
                .entries_for(user)
                .any(|e| e.meta_str("compensates") == Some(id_text.as_str()));
            if already {
                return Err(not_eligible("entry was already compensated"));
            }
            let delta = -original.balance_delta();
            if delta.is_zero() {
                return Err(not_eligible("entry has no balance effect"));
            }

            let entry = LedgerEntry::new(user, original.kind, &original.asset, delta, EntryStatus::Completed)
                .with_description(format!("Compensation for {id}: {reason}"))
                .with_meta("compensates", id_text.as_str())
                .with_meta("reason", reason);
            uow.append(entry.clone())?;
            apply_delta(uow, &original.asset, delta)?;
            Ok(entry)
        })?;
        tracing::warn!(user = %user, original = %id, entry = %entry.id, reason, "Compensating entry posted");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub(crate) fn check_asset_amount(&self, asset: &str, amount: Decimal) -> Result<()> {
        self.config.ensure_supported(asset)?;
        validate_amount(amount)
    }

    fn check_withdrawal(&self, request: &WithdrawalRequest) -> Result<()> {
        self.check_asset_amount(&request.asset, request.amount)?;
        check_fee(request.fee)?;
        if request.destination.trim().is_empty() {
            return Err(RdxError::InvalidAmount {
                reason: "withdrawal destination is empty".into(),
            });
        }
        Ok(())
    }

    fn notify_deposit(&self, entry: &LedgerEntry) {
        self.notify(Notification::new(
            entry.user_id,
            "Deposit Credited",
            format!("{} {} has been credited to your wallet", entry.amount, entry.asset),
            NotificationCategory::Transaction,
        ));
    }
}

/// Fees are optional; a non-zero fee must be a valid amount.
fn check_fee(fee: Decimal) -> Result<()> {
    if fee.is_zero() {
        return Ok(());
    }
    validate_amount(fee)
}

/// Fail with `EntryNotEligible` unless entry `id` in this book is of `kind`.
fn expect_kind(uow: &UnitOfWork<'_>, id: EntryId, kind: EntryKind) -> Result<()> {
    let entry = uow.book().ledger().get(id).ok_or(RdxError::EntryNotFound(id))?;
    if entry.kind != kind {
        return Err(RdxError::EntryNotEligible {
            entry: id,
            reason: format!("expected a {kind} entry, found {}", entry.kind),
        });
    }
    Ok(())
}

/// Credit or debit `available` by a signed delta.
fn apply_delta(uow: &mut UnitOfWork<'_>, asset: &str, delta: Decimal) -> Result<()> {
    if delta > Decimal::ZERO {
        uow.credit(asset, delta, Bucket::Available)
    } else if delta < Decimal::ZERO {
        uow.debit(asset, -delta, Bucket::Available)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdx_types::{AccountKind, EngineConfig, EntryFilter, Page};

    fn setup() -> (RewardEngine, UserId) {
        let engine = RewardEngine::new(EngineConfig::default()).unwrap();
        let user = UserId::new();
        engine.open_wallet(user, AccountKind::Spot);
        (engine, user)
    }

    fn usdt(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn validation_happens_before_mutation() {
        let (engine, user) = setup();
        let err = engine.deposit(DepositRequest::new(user, "DOGE", usdt(1))).unwrap_err();
        assert!(matches!(err, RdxError::UnsupportedAsset(_)));
        let err = engine
            .deposit(DepositRequest::new(user, "USDT", Decimal::new(1, 9)))
            .unwrap_err();
        assert!(matches!(err, RdxError::InvalidAmount { .. }));
        assert_eq!(engine.history(user, &EntryFilter::all(), Page::default()).unwrap().total, 0);
    }

    #[test]
    fn duplicate_deposit_reference_rejected() {
        let (engine, user) = setup();
        engine
            .deposit(DepositRequest::new(user, "USDT", usdt(10)).with_reference("0xfeed"))
            .unwrap();
        let err = engine
            .deposit(DepositRequest::new(user, "USDT", usdt(10)).with_reference("0xfeed"))
            .unwrap_err();
        assert!(matches!(err, RdxError::DuplicateDeposit { .. }));
        assert_eq!(engine.balance(user, "USDT").unwrap().available, usdt(10));
    }

    #[test]
    fn pending_deposit_confirm_and_reject() {
        let (engine, user) = setup();
        let a = engine
            .deposit(
                DepositRequest::new(user, "BTC", usdt(2))
                    .pending()
                    .with_addresses("bc1sender", "bc1wallet"),
            )
            .unwrap();
        assert_eq!(a.meta_str("to_address"), Some("bc1wallet"));
        assert_eq!(engine.total_balance(user, "BTC").unwrap(), Decimal::ZERO);

        engine.confirm_deposit(a.id).unwrap();
        assert_eq!(engine.balance(user, "BTC").unwrap().available, usdt(2));

        let b = engine.deposit(DepositRequest::new(user, "BTC", usdt(1)).pending()).unwrap();
        let rejected = engine.reject_deposit(b.id, "chain reorg").unwrap();
        assert_eq!(rejected.status, EntryStatus::Failed);
        assert!(matches!(engine.confirm_deposit(b.id), Err(RdxError::InvalidTransition { .. })));
        assert_eq!(engine.total_balance(user, "BTC").unwrap(), usdt(2));
        engine.verify_user(user).unwrap();
    }

    #[test]
    fn withdrawal_with_fee_lifecycle() {
        let (engine, user) = setup();
        engine.deposit(DepositRequest::new(user, "USDT", usdt(100))).unwrap();
        let w = engine
            .request_withdrawal(WithdrawalRequest::new(user, "USDT", usdt(40), "T-addr").with_fee(usdt(1)))
            .unwrap();
        let bal = engine.balance(user, "USDT").unwrap();
        assert_eq!((bal.available, bal.locked), (usdt(59), usdt(41)));

        engine.complete_withdrawal(w.id).unwrap();
        let bal = engine.balance(user, "USDT").unwrap();
        assert_eq!((bal.available, bal.locked), (usdt(59), Decimal::ZERO));
        engine.verify_user(user).unwrap();
        engine.verify_supply("USDT").unwrap();
    }

    #[test]
    fn failed_and_cancelled_withdrawals_release_funds() {
        let (engine, user) = setup();
        engine.deposit(DepositRequest::new(user, "USDT", usdt(100))).unwrap();
        let a = engine
            .request_withdrawal(WithdrawalRequest::new(user, "USDT", usdt(30), "addr"))
            .unwrap();
        let b = engine
            .request_withdrawal(WithdrawalRequest::new(user, "USDT", usdt(20), "addr"))
            .unwrap();
        engine.fail_withdrawal(a.id, "node offline").unwrap();

        let stranger = UserId::new();
        assert!(engine.cancel_withdrawal(stranger, b.id).unwrap_err().is_not_found());
        let cancelled = engine.cancel_withdrawal(user, b.id).unwrap();
        assert_eq!(cancelled.status, EntryStatus::Cancelled);

        let bal = engine.balance(user, "USDT").unwrap();
        assert_eq!((bal.available, bal.locked), (usdt(100), Decimal::ZERO));
    }

    #[test]
    fn oversized_withdrawal_leaves_no_trace() {
        let (engine, user) = setup();
        engine.deposit(DepositRequest::new(user, "USDT", usdt(10))).unwrap();
        let err = engine
            .request_withdrawal(WithdrawalRequest::new(user, "USDT", usdt(10), "addr").with_fee(usdt(1)))
            .unwrap_err();
        assert!(matches!(err, RdxError::InsufficientBalance { .. }));
        let history = engine.history(user, &EntryFilter::all(), Page::default()).unwrap();
        assert_eq!(history.total, 1);
    }

    #[test]
    fn withdrawal_ops_reject_deposit_entries() {
        let (engine, user) = setup();
        let d = engine.deposit(DepositRequest::new(user, "USDT", usdt(5)).pending()).unwrap();
        let err = engine.complete_withdrawal(d.id).unwrap_err();
        assert!(matches!(err, RdxError::EntryNotEligible { .. }));
    }

    #[test]
    fn transfer_moves_funds_between_users() {
        let (engine, alice) = setup();
        let bob = UserId::new();
        engine.open_wallet(bob, AccountKind::Spot);
        engine.deposit(DepositRequest::new(alice, "ETH", usdt(3))).unwrap();

        let receipt = engine.transfer(alice, bob, "ETH", usdt(2)).unwrap();
        assert_eq!(receipt.outgoing.amount, usdt(-2));
        assert_eq!(receipt.incoming.amount, usdt(2));
        assert_eq!(
            receipt.outgoing.meta_str("transfer_id"),
            receipt.incoming.meta_str("transfer_id")
        );
        assert_eq!(engine.balance(alice, "ETH").unwrap().available, usdt(1));
        assert_eq!(engine.balance(bob, "ETH").unwrap().available, usdt(2));
        engine.verify_supply("ETH").unwrap();

        let err = engine.transfer(bob, alice, "ETH", usdt(5)).unwrap_err();
        assert!(matches!(err, RdxError::InsufficientBalance { .. }));
        assert!(engine.transfer(alice, alice, "ETH", usdt(1)).is_err());
        assert!(matches!(
            engine.transfer(alice, UserId::new(), "ETH", usdt(1)),
            Err(RdxError::WalletNotFound(_))
        ));
    }

    #[test]
    fn trade_applies_signed_delta_minus_fee() {
        let (engine, user) = setup();
        engine.deposit(DepositRequest::new(user, "USDT", usdt(100))).unwrap();
        engine
            .record_trade(user, "USDT", usdt(-50), usdt(1), "fill-1")
            .unwrap();
        engine
            .record_trade(user, "BTC", Decimal::new(1, 3), Decimal::ZERO, "fill-1")
            .unwrap();
        assert_eq!(engine.balance(user, "USDT").unwrap().available, usdt(49));
        assert_eq!(engine.balance(user, "BTC").unwrap().available, Decimal::new(1, 3));
        engine.verify_user(user).unwrap();
    }

    #[test]
    fn compensation_reverses_once() {
        let (engine, user) = setup();
        let d = engine.deposit(DepositRequest::new(user, "USDT", usdt(25))).unwrap();
        let c = engine.post_compensation(d.id, "duplicate credit").unwrap();
        assert_eq!(c.amount, usdt(-25));
        assert_eq!(c.meta_str("compensates"), Some(d.id.to_string().as_str()));
        assert_eq!(engine.total_balance(user, "USDT").unwrap(), Decimal::ZERO);

        let again = engine.post_compensation(d.id, "again").unwrap_err();
        assert!(matches!(again, RdxError::EntryNotEligible { .. }));
        let nested = engine.post_compensation(c.id, "undo").unwrap_err();
        assert!(matches!(nested, RdxError::EntryNotEligible { .. }));
        engine.verify_user(user).unwrap();
        engine.verify_supply("USDT").unwrap();
    }

    #[test]
    fn compensation_of_pending_entry_rejected() {
        let (engine, user) = setup();
        let d = engine.deposit(DepositRequest::new(user, "USDT", usdt(5)).pending()).unwrap();
        assert!(matches!(
            engine.post_compensation(d.id, "x"),
            Err(RdxError::EntryNotEligible { .. })
        ));
    }
}
