//! Referral record: a user's code, who they referred, and what they earned.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ReferralCode, UserId};

/// Per-user referral state.
///
/// Invariant: `total_earnings >= pending_rewards >= 0`, and each referred
/// user appears at most once in `referred_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub user_id: UserId,
    pub code: ReferralCode,
    /// Referred users in the order they were credited.
    pub referred_users: Vec<UserId>,
    /// Everything ever earned from referrals.
    pub total_earnings: Decimal,
    /// Earned (and already credited to the wallet) but not yet acknowledged.
    pub pending_rewards: Decimal,
    pub created_at: DateTime<Utc>,
}

impl ReferralRecord {
    #[must_use]
    pub fn new(user_id: UserId, code: ReferralCode) -> Self {
        Self {
            user_id,
            code,
            referred_users: Vec::new(),
            total_earnings: Decimal::ZERO,
            pending_rewards: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn total_referrals(&self) -> usize {
        self.referred_users.len()
    }

    #[must_use]
    pub fn has_referred(&self, user: UserId) -> bool {
        self.referred_users.contains(&user)
    }
}
