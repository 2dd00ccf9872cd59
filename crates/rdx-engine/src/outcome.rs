//! Results returned by engine operations.

use chrono::NaiveDate;
use rdx_accounts::CheckInDay;
use rdx_types::{Asset, BalanceEntry, CheckIn, LedgerEntry, ReferralRecord, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A successful daily check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInOutcome {
    pub check_in: CheckIn,
    /// The completed reward entry.
    pub entry: LedgerEntry,
    /// Reward asset balance after the credit.
    pub balance: BalanceEntry,
}

impl CheckInOutcome {
    #[must_use]
    pub fn streak_day(&self) -> u8 {
        self.check_in.streak_day
    }

    #[must_use]
    pub fn reward(&self) -> Decimal {
        self.check_in.reward
    }
}

/// Check-in view for "today".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInStatus {
    pub today: NaiveDate,
    /// Today's streak if checked in, else yesterday's, else 0.
    pub current_streak: u8,
    pub can_check_in: bool,
    /// Streak day and reward a check-in today gets (or got).
    pub next_streak_day: u8,
    pub next_reward: Decimal,
    /// `today - 6 ..= today`, oldest first.
    pub calendar: Vec<CheckInDay>,
}

/// A credited referral.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralOutcome {
    pub referrer: UserId,
    pub referred: UserId,
    pub entry: LedgerEntry,
    /// Referrer's record after the credit.
    pub record: ReferralRecord,
}

/// Both legs of an internal transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub outgoing: LedgerEntry,
    pub incoming: LedgerEntry,
}

/// One asset in a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioLine {
    pub asset: Asset,
    pub balance: BalanceEntry,
    /// Display price, if the price source knows the asset.
    pub price: Option<Decimal>,
    /// `total * price`.
    pub value: Option<Decimal>,
}

/// All balances of a user with display valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: UserId,
    pub lines: Vec<PortfolioLine>,
    /// Sum of the known line values.
    pub total_value: Decimal,
}
