//! # rdx-engine
//!
//! **Reward orchestrator**: the single entry point for every balance change.
//!
//! ## Operations
//!
//! | Area       | Operations                                                        |
//! |------------|-------------------------------------------------------------------|
//! | Wallets    | `open_wallet`, `wallet`, `balance`, `portfolio`, `deposit_addresses` |
//! | Funds      | `deposit`, `confirm_deposit`, `request_withdrawal`, `transfer`...  |
//! | Rewards    | `check_in`, `check_in_status`, `credit_referral`, `grant_bonus`    |
//! | Ledger     | `entry`, `history`, `reward_history`, `post_compensation`          |
//! | Invariants | `verify_user`, `verify_supply`, `verify_all_supply`                |
//!
//! Each mutating operation validates its input, then runs one
//! [`rdx_accounts::UnitOfWork`] on the affected user's book: either every
//! wallet change and ledger entry lands, or none does. Notifications are sent
//! after commit and never roll anything back.
//!
//! ```no_run
//! use chrono::Utc;
//! use rdx_engine::RewardEngine;
//! use rdx_types::{AccountKind, EngineConfig, UserId};
//!
//! # fn main() -> rdx_types::Result<()> {
//! let engine = RewardEngine::new(EngineConfig::default())?;
//! let user = UserId::new();
//! engine.open_wallet(user, AccountKind::Spot);
//! let outcome = engine.check_in(user, Utc::now())?;
//! assert_eq!(outcome.streak_day(), 1);
//! # Ok(())
//! # }
//! ```

mod addresses;
pub mod collaborators;
pub mod engine;
mod funds;
pub mod outcome;
pub mod request;
mod rewards;

pub use collaborators::{ChannelNotifier, NoopNotifier, Notifier, PriceSource, StaticPrices};
pub use engine::RewardEngine;
pub use outcome::{CheckInOutcome, CheckInStatus, Portfolio, PortfolioLine, ReferralOutcome, TransferReceipt};
pub use request::{DepositRequest, WithdrawalRequest};
