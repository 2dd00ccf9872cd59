//! Integration tests for the ledger-append protocol.
//!
//! Drives random sequences of units of work against one book and checks,
//! after every unit, that the wallet never goes negative and that completed
//! ledger deltas reconcile with wallet totals.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rdx_accounts::{SupplyConservation, UnitOfWork, UserBook};
use rdx_types::*;
use rust_decimal::Decimal;

const ASSETS: [&str; 2] = ["USDT", "BTC"];

fn deposit(book: &mut UserBook, asset: &str, amount: Decimal) -> Result<Vec<(Asset, Decimal)>> {
    let user = book.user_id();
    let mut uow = UnitOfWork::begin(book, "deposit");
    uow.append(LedgerEntry::new(user, EntryKind::Deposit, asset, amount, EntryStatus::Completed))?;
    uow.credit(asset, amount, Bucket::Available)?;
    Ok(uow.commit()?.supply_deltas)
}

fn request_withdrawal(book: &mut UserBook, asset: &str, amount: Decimal, fee: Decimal) -> Result<EntryId> {
    let user = book.user_id();
    let mut uow = UnitOfWork::begin(book, "request_withdrawal");
    let id = uow.append(
        LedgerEntry::new(user, EntryKind::Withdrawal, asset, -amount, EntryStatus::Pending).with_fee(fee),
    )?;
    uow.lock(asset, amount + fee)?;
    uow.commit()?;
    Ok(id)
}

fn settle_withdrawal(book: &mut UserBook, id: EntryId, success: bool) -> Result<Vec<(Asset, Decimal)>> {
    let entry = book.ledger().get(id).cloned().ok_or(RdxError::EntryNotFound(id))?;
    let reserved = -entry.amount + entry.fee;
    let mut uow = UnitOfWork::begin(book, "settle_withdrawal");
    if success {
        uow.transition(id, EntryStatus::Completed)?;
        uow.debit(&entry.asset, reserved, Bucket::Locked)?;
    } else {
        uow.transition(id, EntryStatus::Failed)?;
        uow.unlock(&entry.asset, reserved)?;
    }
    Ok(uow.commit()?.supply_deltas)
}

#[test]
fn random_units_keep_book_reconciled() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut book = UserBook::new(UserId::new(), AccountKind::Spot, 64);
    let supply = SupplyConservation::new();
    let mut open: Vec<EntryId> = Vec::new();

    for _ in 0..1_000 {
        let asset = ASSETS[rng.gen_range(0..ASSETS.len())];
        let amount = Decimal::new(rng.gen_range(1..=10_000), 2);
        let before = book.wallet().clone();
        let before_entries = book.ledger().len();

        let outcome = match rng.gen_range(0..4) {
            0 => deposit(&mut book, asset, amount),
            1 => {
                let fee = Decimal::new(rng.gen_range(0..=100), 2);
                request_withdrawal(&mut book, asset, amount, fee).map(|id| {
                    open.push(id);
                    Vec::new()
                })
            }
            _ if !open.is_empty() => {
                let id = open.swap_remove(rng.gen_range(0..open.len()));
                settle_withdrawal(&mut book, id, rng.gen_bool(0.7))
            }
            _ => Ok(Vec::new()),
        };

        match outcome {
            Ok(deltas) => {
                for (asset, delta) in deltas {
                    supply.record(&asset, delta).unwrap();
                }
            }
            Err(err) => {
                assert!(
                    matches!(err, RdxError::InsufficientBalance { .. }),
                    "unexpected error: {err}"
                );
                assert_eq!(book.wallet(), &before, "failed unit mutated the wallet");
                assert_eq!(book.ledger().len(), before_entries, "failed unit left an entry");
            }
        }

        for balance in book.wallet().balances().values() {
            assert!(balance.available >= Decimal::ZERO);
            assert!(balance.locked >= Decimal::ZERO);
        }
        book.reconcile().unwrap();
    }

    for asset in ASSETS {
        supply
            .verify(asset, book.wallet().total_balance(asset))
            .unwrap();
    }
}

#[test]
fn fund_lock_complete_scenario() {
    let mut book = UserBook::new(UserId::new(), AccountKind::Spot, 8);
    deposit(&mut book, "USDT", Decimal::new(100, 0)).unwrap();
    let id = request_withdrawal(&mut book, "USDT", Decimal::new(40, 0), Decimal::ZERO).unwrap();

    let bal = book.wallet().balance("USDT");
    assert_eq!(bal.available, Decimal::new(60, 0));
    assert_eq!(bal.locked, Decimal::new(40, 0));

    settle_withdrawal(&mut book, id, true).unwrap();
    let bal = book.wallet().balance("USDT");
    assert_eq!(bal.available, Decimal::new(60, 0));
    assert_eq!(bal.locked, Decimal::ZERO);

    let history = book.ledger().list_for_user(book.user_id(), &EntryFilter::all(), Page::default());
    let kinds: Vec<(EntryKind, EntryStatus)> = history.items.iter().map(|e| (e.kind, e.status)).collect();
    assert_eq!(
        kinds,
        vec![
            (EntryKind::Withdrawal, EntryStatus::Completed),
            (EntryKind::Deposit, EntryStatus::Completed),
        ]
    );
    book.reconcile().unwrap();
}

#[test]
fn settled_withdrawal_cannot_be_settled_again() {
    let mut book = UserBook::new(UserId::new(), AccountKind::Spot, 8);
    deposit(&mut book, "BTC", Decimal::ONE).unwrap();
    let id = request_withdrawal(&mut book, "BTC", Decimal::new(5, 1), Decimal::new(1, 2)).unwrap();
    settle_withdrawal(&mut book, id, false).unwrap();

    let err = settle_withdrawal(&mut book, id, true).unwrap_err();
    assert!(matches!(err, RdxError::InvalidTransition { .. }));
    assert_eq!(book.wallet().balance("BTC").available, Decimal::ONE);
}
