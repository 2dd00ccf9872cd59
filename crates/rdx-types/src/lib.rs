//! # rdx-types
//!
//! Shared types, errors, and configuration for the **RDX** accounting engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`EntryId`], [`ReferralCode`]
//! - **Balance model**: [`BalanceEntry`], [`Bucket`], [`AccountKind`], [`Asset`]
//! - **Ledger model**: [`LedgerEntry`], [`EntryKind`], [`EntryStatus`], [`EntryFilter`], [`Page`]
//! - **Reward records**: [`CheckIn`], [`AccountingCalendar`], [`ReferralRecord`]
//! - **Notifications**: [`Notification`], [`NotificationCategory`]
//! - **Configuration**: [`EngineConfig`], [`RewardSchedule`]
//! - **Errors**: [`RdxError`] with `RDX_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod checkin;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod ids;
pub mod notification;
pub mod referral;

// Re-export all primary types at crate root for ergonomic imports:
//   use rdx_types::{LedgerEntry, EntryKind, BalanceEntry, ...};

pub use balance::*;
pub use checkin::*;
pub use config::*;
pub use entry::*;
pub use error::*;
pub use ids::*;
pub use notification::*;
pub use referral::*;

// Constants are accessed via `rdx_types::constants::FOO`
// (not re-exported to avoid name collisions).
