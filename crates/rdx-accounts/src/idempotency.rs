//! Deposit idempotency guard.
//!
//! Each external deposit reference (e.g. an on-chain transaction hash) may
//! be reported once per user. Reporting the same reference again returns
//! [`RdxError::DuplicateDeposit`].
//!
//! The guard is a bounded cache: when full, the oldest reference is evicted,
//! so memory stays flat for long-lived wallets.

use std::collections::{HashSet, VecDeque};

use rdx_types::{RdxError, Result};

/// Remembers recently seen deposit references.
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    seen: HashSet<String>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<String>,
    max_size: usize,
}

impl IdempotencyGuard {
    /// Guard holding at most `max_size` references (at least one).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    /// Remember `reference`.
    ///
    /// # Errors
    /// Returns [`RdxError::DuplicateDeposit`] if it was already seen.
    pub fn mark_seen(&mut self, reference: &str) -> Result<()> {
        if self.seen.contains(reference) {
            return Err(RdxError::DuplicateDeposit {
                reference: reference.to_string(),
            });
        }
        if self.seen.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(reference.to_string());
        self.order.push_back(reference.to_string());
        Ok(())
    }

    #[must_use]
    pub fn is_seen(&self, reference: &str) -> bool {
        self.seen.contains(reference)
    }

    /// Drop the most recent reference again (rollback of an uncommitted unit).
    pub(crate) fn forget(&mut self, reference: &str) {
        if self.seen.remove(reference) {
            if let Some(pos) = self.order.iter().rposition(|r| r == reference) {
                self.order.remove(pos);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
