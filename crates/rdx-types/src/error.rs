//! Error types for the RDX accounting engine.
//!
//! All errors use the `RDX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors (rejected before any state is touched)
//! - 2xx: Wallet errors
//! - 3xx: Ledger errors
//! - 4xx: Reward / referral errors
//! - 5xx: Invariant violations
//! - 9xx: General / internal errors

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{Bucket, EntryId, EntryStatus, UserId};

/// Central error enum for all RDX operations.
#[derive(Debug, Error)]
pub enum RdxError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Amount is zero, negative, or too precise.
    #[error("RDX_ERR_100: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Asset is not in the configured asset list.
    #[error("RDX_ERR_101: Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// A user tried to refer themselves.
    #[error("RDX_ERR_102: Self-referral is not allowed for user {0}")]
    SelfReferral(UserId),

    /// Check-in attempted for a day earlier than the latest recorded one.
    #[error("RDX_ERR_103: Check-in for {day} predates latest check-in on {latest}")]
    StaleCheckIn { day: NaiveDate, latest: NaiveDate },

    // =================================================================
    // Wallet Errors (2xx)
    // =================================================================
    /// Not enough funds in the source bucket.
    #[error("RDX_ERR_200: Insufficient {bucket} {asset} balance: need {needed}, have {available}")]
    InsufficientBalance {
        asset: String,
        bucket: Bucket,
        needed: Decimal,
        available: Decimal,
    },

    /// No wallet has been opened for this user.
    #[error("RDX_ERR_201: Wallet not found for user {0}")]
    WalletNotFound(UserId),

    // =================================================================
    // Ledger Errors (3xx)
    // =================================================================
    /// The requested ledger entry does not exist.
    #[error("RDX_ERR_300: Ledger entry not found: {0}")]
    EntryNotFound(EntryId),

    /// Status change out of a terminal state or to a non-terminal one.
    #[error("RDX_ERR_301: Invalid status transition for {entry}: {from} -> {to}")]
    InvalidTransition {
        entry: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },

    /// An entry id is already present in the store.
    #[error("RDX_ERR_302: Duplicate ledger entry: {0}")]
    DuplicateEntry(EntryId),

    /// Deposit with this external reference was already reported.
    #[error("RDX_ERR_303: Deposit already reported: {reference}")]
    DuplicateDeposit { reference: String },

    /// The entry exists but the operation does not apply to it.
    #[error("RDX_ERR_304: Entry {entry} not eligible: {reason}")]
    EntryNotEligible { entry: EntryId, reason: String },

    // =================================================================
    // Reward / Referral Errors (4xx)
    // =================================================================
    /// The user already checked in on this accounting day.
    #[error("RDX_ERR_400: User {user} already checked in on {day}")]
    AlreadyCheckedIn { user: UserId, day: NaiveDate },

    /// The referred user has already been credited to this referrer.
    #[error("RDX_ERR_401: Referral of {referred} already credited to {referrer}")]
    DuplicateReferral { referrer: UserId, referred: UserId },

    /// No user owns this referral code.
    #[error("RDX_ERR_402: Referral code not found: {0}")]
    ReferralCodeNotFound(String),

    /// Every candidate code for this user collided.
    #[error("RDX_ERR_403: Could not allocate a unique referral code for {0}")]
    ReferralCodeExhausted(UserId),

    // =================================================================
    // Invariant Violations (5xx)
    // =================================================================
    /// Wallet totals disagree with the completed ledger entries.
    #[error("RDX_ERR_500: Ledger drift for user {user} asset {asset}: ledger {ledger} != wallet {wallet}")]
    LedgerDrift {
        user: UserId,
        asset: String,
        ledger: Decimal,
        wallet: Decimal,
    },

    /// Global supply conservation check failed. Critical.
    #[error("RDX_ERR_501: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error. The unit of work was aborted.
    #[error("RDX_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("RDX_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("RDX_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// A post-commit collaborator (notifier, price feed) failed.
    #[error("RDX_ERR_903: Collaborator error: {0}")]
    Collaborator(String),
}

impl RdxError {
    /// Referencing something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WalletNotFound(_) | Self::EntryNotFound(_) | Self::ReferralCodeNotFound(_)
        )
    }

    /// Errors the caller can fix by changing the request (or just stop retrying).
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::UnsupportedAsset(_)
                | Self::SelfReferral(_)
                | Self::StaleCheckIn { .. }
                | Self::InsufficientBalance { .. }
                | Self::DuplicateDeposit { .. }
                | Self::EntryNotEligible { .. }
                | Self::AlreadyCheckedIn { .. }
                | Self::DuplicateReferral { .. }
        )
    }

    /// Errors that indicate a defect or a broken invariant. Callers should
    /// surface these as opaque internal errors.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::DuplicateEntry(_)
                | Self::LedgerDrift { .. }
                | Self::SupplyInvariantViolation { .. }
                | Self::Internal(_)
                | Self::Serialization(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, RdxError>;

impl From<serde_json::Error> for RdxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = RdxError::EntryNotFound(EntryId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("RDX_ERR_300"), "Got: {msg}");
    }

    #[test]
    fn insufficient_balance_display() {
        let err = RdxError::InsufficientBalance {
            asset: "USDT".into(),
            bucket: Bucket::Available,
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("RDX_ERR_200"));
        assert!(msg.contains("available USDT"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = RdxError::InvalidTransition {
            entry: EntryId::new(),
            from: EntryStatus::Completed,
            to: EntryStatus::Failed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("RDX_ERR_301"));
        assert!(msg.contains("completed -> failed"));
    }

    #[test]
    fn classification() {
        assert!(RdxError::WalletNotFound(UserId::new()).is_not_found());
        assert!(RdxError::AlreadyCheckedIn {
            user: UserId::new(),
            day: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
        .is_user_correctable());
        assert!(RdxError::Internal("boom".into()).is_internal());
        assert!(!RdxError::Collaborator("smtp down".into()).is_internal());
    }

    #[test]
    fn all_errors_have_rdx_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(RdxError::UnsupportedAsset("DOGE".into())),
            Box::new(RdxError::ReferralCodeNotFound("RDX00000000".into())),
            Box::new(RdxError::Internal("test".into())),
            Box::new(RdxError::SupplyInvariantViolation { reason: "x".into() }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(msg.starts_with("RDX_ERR_"), "Error missing RDX_ERR_ prefix: {msg}");
        }
    }

    #[test]
    fn serde_json_error_converts() {
        let err: RdxError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RdxError::Serialization(_)));
    }
}
