//! # rdx-accounts
//!
//! **Accounting state**: per-user wallets, the append-only ledger, check-in
//! history, referral ledgers, and the unit of work that mutates them together.
//!
//! ## Architecture
//!
//! All state belonging to one user lives in a [`UserBook`]:
//! 1. **WalletAccount**: available/locked balances per asset
//! 2. **LedgerStore**: immutable entries explaining every balance change
//! 3. **StreakTracker**: check-in history, streak resolved by folding it
//! 4. **ReferralLedger**: referral code, referred users, earnings
//! 5. **IdempotencyGuard**: external deposit references already seen
//!
//! A [`UnitOfWork`] borrows one book mutably, records an undo action for
//! every change, and rolls everything back unless it is committed.
//!
//! ```text
//! UnitOfWork::begin(book) → record_check_in() → append() → credit() → commit()
//!                         ↘ any error: drop → rollback (book untouched)
//! ```
//!
//! Cross-user state (the referral code registry and global supply
//! counters) is concurrent and lock-free for readers.

pub mod book;
pub mod idempotency;
pub mod ledger_store;
pub mod referral;
pub mod streak;
pub mod supply_conservation;
pub mod unit_of_work;
pub mod wallet;

pub use book::UserBook;
pub use idempotency::IdempotencyGuard;
pub use ledger_store::LedgerStore;
pub use referral::{ReferralCodeRegistry, ReferralLedger};
pub use streak::{CheckInDay, StreakResolution, StreakTracker};
pub use supply_conservation::{SupplyConservation, reconcile_wallet};
pub use unit_of_work::{Committed, UnitOfWork};
pub use wallet::WalletAccount;
