//! # LedgerEntry: the immutable record of a balance-affecting event
//!
//! ## Status Machine
//!
//! ```text
//!   ┌─────────┐  settle     ┌───────────┐
//!   │ PENDING ├────────────▶│ COMPLETED │
//!   └──┬───┬──┘             └───────────┘
//!      │   │ reject/fail    ┌───────────┐
//!      │   └───────────────▶│  FAILED   │
//!      │ cancel             └───────────┘
//!      ▼
//!   ┌───────────┐
//!   │ CANCELLED │
//!   └───────────┘
//! ```
//!
//! Transitions happen at most once. Terminal states are final; a completed
//! entry is corrected by appending a compensating entry, never by editing.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntryId, RdxError, Result, UserId, constants};

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Trade,
    Transfer,
    Reward,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
            Self::Trade => write!(f, "trade"),
            Self::Transfer => write!(f, "transfer"),
            Self::Reward => write!(f, "reward"),
        }
    }
}

/// Lifecycle state of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Accepted, balance effect not yet final (funds may be locked).
    Pending,
    /// Balance effect applied. **Irreversible.**
    Completed,
    /// Settlement failed; any reservation was released.
    Failed,
    /// Withdrawn by the user or operator before settlement.
    Cancelled,
}

impl EntryStatus {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Can an entry in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Free-form correlation data (source address, streak day, counterpart...).
pub type EntryMetadata = BTreeMap<String, serde_json::Value>;

/// A single ledger entry.
///
/// `amount` is signed from the owner's point of view: deposits and rewards
/// are positive, withdrawals and outgoing transfers negative. `fee` is always
/// non-negative and is charged on top of `amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub kind: EntryKind,
    pub asset: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: EntryStatus,
    pub description: String,
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a new entry with a fresh id and no fee.
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: EntryKind,
        asset: &str,
        amount: Decimal,
        status: EntryStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntryId::new(),
            user_id,
            kind,
            asset: asset.to_string(),
            amount,
            fee: Decimal::ZERO,
            status,
            description: String::new(),
            metadata: EntryMetadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }

    /// Net change this entry makes to the owner's total balance once completed.
    #[must_use]
    pub fn balance_delta(&self) -> Decimal {
        self.amount - self.fee
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == EntryStatus::Completed
    }

    /// Move to `target`, enforcing the status machine.
    ///
    /// # Errors
    /// Returns [`RdxError::InvalidTransition`] if the current state is terminal
    /// or `target` is not a legal successor.
    pub fn mark_status(&mut self, target: EntryStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(RdxError::InvalidTransition {
                entry: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = at;
        Ok(())
    }

    /// Whether this entry passes every set field of `filter`.
    #[must_use]
    pub fn matches(&self, filter: &EntryFilter) -> bool {
        filter.kind.is_none_or(|k| k == self.kind)
            && filter.status.is_none_or(|s| s == self.status)
            && filter.asset.as_deref().is_none_or(|a| a == self.asset)
            && filter.since.is_none_or(|t| self.created_at >= t)
            && filter.until.is_none_or(|t| self.created_at < t)
    }
}

/// Listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub status: Option<EntryStatus>,
    pub asset: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EntryFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn asset(mut self, asset: &str) -> Self {
        self.asset = Some(asset.to_string());
        self
    }
}

/// Offset pagination. `limit` is clamped to [`constants::MAX_PAGE_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, constants::MAX_PAGE_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, constants::DEFAULT_PAGE_LIMIT)
    }
}

/// One page of results plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: Page,
}

/// Test fixture. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl LedgerEntry {
    /// A completed deposit of `amount` units.
    #[must_use]
    pub fn dummy_deposit(user_id: UserId, asset: &str, amount: Decimal) -> Self {
        Self::new(user_id, EntryKind::Deposit, asset, amount, EntryStatus::Completed)
            .with_description(format!("Deposit {amount} {asset}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> LedgerEntry {
        LedgerEntry::new(
            UserId::new(),
            EntryKind::Withdrawal,
            "USDT",
            Decimal::new(-40, 0),
            EntryStatus::Pending,
        )
    }

    #[test]
    fn status_transitions_valid() {
        assert!(EntryStatus::Pending.can_transition_to(EntryStatus::Completed));
        assert!(EntryStatus::Pending.can_transition_to(EntryStatus::Failed));
        assert!(EntryStatus::Pending.can_transition_to(EntryStatus::Cancelled));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!EntryStatus::Pending.can_transition_to(EntryStatus::Pending));
        for terminal in [EntryStatus::Completed, EntryStatus::Failed, EntryStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for target in [
                EntryStatus::Pending,
                EntryStatus::Completed,
                EntryStatus::Failed,
                EntryStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(target), "{terminal} -> {target}");
            }
        }
    }

    #[test]
    fn mark_status_once() {
        let mut entry = pending();
        entry.mark_status(EntryStatus::Completed, Utc::now()).unwrap();
        assert!(entry.is_completed());
        let err = entry.mark_status(EntryStatus::Failed, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            RdxError::InvalidTransition {
                from: EntryStatus::Completed,
                to: EntryStatus::Failed,
                ..
            }
        ));
        assert!(entry.is_completed(), "status must be unchanged after a rejected transition");
    }

    #[test]
    fn balance_delta_includes_fee() {
        let entry = pending().with_fee(Decimal::ONE);
        assert_eq!(entry.balance_delta(), Decimal::new(-41, 0));
    }

    #[test]
    fn filter_matching() {
        let entry = pending().with_meta("to_address", "0xabc");
        assert!(entry.matches(&EntryFilter::all()));
        assert!(entry.matches(&EntryFilter::all().kind(EntryKind::Withdrawal).asset("USDT")));
        assert!(!entry.matches(&EntryFilter::all().status(EntryStatus::Completed)));
        assert!(!entry.matches(&EntryFilter::all().asset("BTC")));
        assert_eq!(entry.meta_str("to_address"), Some("0xabc"));
    }

    #[test]
    fn page_limit_clamped() {
        assert_eq!(Page::new(0, 0).limit, 1);
        assert_eq!(Page::new(0, 10_000).limit, constants::MAX_PAGE_LIMIT);
        assert_eq!(Page::default().limit, constants::DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn serde_uses_snake_case() {
        let entry = LedgerEntry::dummy_deposit(UserId::new(), "BTC", Decimal::ONE);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "deposit");
        assert_eq!(json["status"], "completed");
        let back: LedgerEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
