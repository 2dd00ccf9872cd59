//! Referral ledgers and the global referral-code registry.

use std::collections::HashSet;

use dashmap::{DashMap, mapref::entry::Entry};
use rdx_types::{RdxError, ReferralCode, ReferralRecord, Result, UserId, constants};
use rust_decimal::Decimal;

/// One user's referral state, wrapping the persisted [`ReferralRecord`].
#[derive(Debug, Clone)]
pub struct ReferralLedger {
    record: ReferralRecord,
    /// Mirror of `record.referred_users` for O(1) duplicate checks.
    referred: HashSet<UserId>,
}

impl ReferralLedger {
    #[must_use]
    pub fn new(user_id: UserId, code: ReferralCode) -> Self {
        Self {
            record: ReferralRecord::new(user_id, code),
            referred: HashSet::new(),
        }
    }

    #[must_use]
    pub fn record(&self) -> &ReferralRecord {
        &self.record
    }

    #[must_use]
    pub fn code(&self) -> &ReferralCode {
        &self.record.code
    }

    /// Count `referred` once and add `reward` to earnings.
    ///
    /// # Errors
    /// - `SelfReferral` if `referred` is the ledger's owner
    /// - `DuplicateReferral` if `referred` was already credited
    pub fn credit(&mut self, referred: UserId, reward: Decimal) -> Result<()> {
        let owner = self.record.user_id;
        if referred == owner {
            return Err(RdxError::SelfReferral(owner));
        }
        if self.referred.contains(&referred) {
            return Err(RdxError::DuplicateReferral {
                referrer: owner,
                referred,
            });
        }
        self.referred.insert(referred);
        self.record.referred_users.push(referred);
        self.record.total_earnings += reward;
        self.record.pending_rewards += reward;
        Ok(())
    }

    /// Reset unacknowledged earnings, returning how much was acknowledged.
    pub fn acknowledge(&mut self) -> Decimal {
        std::mem::take(&mut self.record.pending_rewards)
    }

    #[must_use]
    pub fn has_referred(&self, user: UserId) -> bool {
        self.referred.contains(&user)
    }
}

/// Maps referral codes to owners, and each referred user to the one
/// referrer credited for them. Shared by all users.
#[derive(Debug, Default)]
pub struct ReferralCodeRegistry {
    by_code: DashMap<ReferralCode, UserId>,
    by_user: DashMap<UserId, ReferralCode>,
    referred_by: DashMap<UserId, UserId>,
}

impl ReferralCodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's code, assigning a fresh one on first call.
    ///
    /// Candidates are derived deterministically per attempt; a candidate
    /// owned by another user is skipped.
    ///
    /// # Errors
    /// Returns `ReferralCodeExhausted` if every attempt collided.
    pub fn claim(&self, user: UserId) -> Result<ReferralCode> {
        if let Some(code) = self.code_of(user) {
            return Ok(code);
        }
        for attempt in 0..constants::MAX_REFERRAL_CODE_ATTEMPTS {
            let candidate = ReferralCode::derive(user, attempt);
            match self.by_code.entry(candidate.clone()) {
                Entry::Occupied(owner) if *owner.get() == user => return Ok(candidate),
                Entry::Occupied(_) => {
                    tracing::debug!(user = %user, attempt, "Referral code collision, retrying");
                }
                Entry::Vacant(slot) => {
                    slot.insert(user);
                    self.by_user.insert(user, candidate.clone());
                    return Ok(candidate);
                }
            }
        }
        Err(RdxError::ReferralCodeExhausted(user))
    }

    /// Owner of `code`.
    ///
    /// # Errors
    /// Returns `ReferralCodeNotFound` for unknown codes.
    pub fn resolve(&self, code: &ReferralCode) -> Result<UserId> {
        self.by_code
            .get(code)
            .map(|owner| *owner)
            .ok_or_else(|| RdxError::ReferralCodeNotFound(code.to_string()))
    }

    #[must_use]
    pub fn code_of(&self, user: UserId) -> Option<ReferralCode> {
        self.by_user.get(&user).map(|code| code.clone())
    }

    /// Claim `referred` for `referrer`. A user can be referred once, by
    /// one referrer.
    ///
    /// # Errors
    /// `DuplicateReferral` naming the referrer already holding `referred`.
    pub fn bind_referral(&self, referrer: UserId, referred: UserId) -> Result<()> {
        match self.referred_by.entry(referred) {
            Entry::Occupied(holder) => Err(RdxError::DuplicateReferral {
                referrer: *holder.get(),
                referred,
            }),
            Entry::Vacant(slot) => {
                slot.insert(referrer);
                Ok(())
            }
        }
    }

    /// Undo a [`Self::bind_referral`] whose credit did not commit.
    pub fn unbind_referral(&self, referrer: UserId, referred: UserId) {
        self.referred_by.remove_if(&referred, |_, holder| *holder == referrer);
    }

    #[must_use]
    pub fn referrer_of(&self, referred: UserId) -> Option<UserId> {
        self.referred_by.get(&referred).map(|holder| *holder)
    }

    pub fn clear(&self) {
        self.by_code.clear();
        self.by_user.clear();
        self.referred_by.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ReferralLedger {
        let user = UserId::new();
        ReferralLedger::new(user, ReferralCode::derive(user, 0))
    }

    #[test]
    fn credit_updates_totals_once() {
        let mut l = ledger();
        let friend = UserId::new();
        l.credit(friend, Decimal::new(10, 0)).unwrap();
        let err = l.credit(friend, Decimal::new(10, 0)).unwrap_err();
        assert!(matches!(err, RdxError::DuplicateReferral { .. }));
        assert_eq!(l.record().total_referrals(), 1);
        assert_eq!(l.record().total_earnings, Decimal::new(10, 0));
        assert_eq!(l.record().pending_rewards, Decimal::new(10, 0));
    }

    #[test]
    fn self_referral_rejected() {
        let mut l = ledger();
        let owner = l.record().user_id;
        assert!(matches!(l.credit(owner, Decimal::ONE), Err(RdxError::SelfReferral(_))));
        assert_eq!(l.record().total_referrals(), 0);
    }

    #[test]
    fn acknowledge_resets_pending_only() {
        let mut l = ledger();
        l.credit(UserId::new(), Decimal::new(10, 0)).unwrap();
        l.credit(UserId::new(), Decimal::new(10, 0)).unwrap();
        assert_eq!(l.acknowledge(), Decimal::new(20, 0));
        assert_eq!(l.acknowledge(), Decimal::ZERO);
        assert_eq!(l.record().total_earnings, Decimal::new(20, 0));
        assert!(l.record().total_earnings >= l.record().pending_rewards);
    }

    #[test]
    fn claim_is_stable() {
        let reg = ReferralCodeRegistry::new();
        let user = UserId::new();
        let a = reg.claim(user).unwrap();
        let b = reg.claim(user).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.resolve(&a).unwrap(), user);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn claim_skips_codes_owned_by_others() {
        let reg = ReferralCodeRegistry::new();
        let user = UserId::new();
        let squatter = UserId::new();
        // Occupy the first candidate.
        reg.by_code.insert(ReferralCode::derive(user, 0), squatter);
        let code = reg.claim(user).unwrap();
        assert_eq!(code, ReferralCode::derive(user, 1));
    }

    #[test]
    fn claim_exhausted() {
        let reg = ReferralCodeRegistry::new();
        let user = UserId::new();
        let squatter = UserId::new();
        for attempt in 0..constants::MAX_REFERRAL_CODE_ATTEMPTS {
            reg.by_code.insert(ReferralCode::derive(user, attempt), squatter);
        }
        assert!(matches!(reg.claim(user), Err(RdxError::ReferralCodeExhausted(_))));
    }

    #[test]
    fn resolve_unknown_code() {
        let reg = ReferralCodeRegistry::new();
        let err = reg.resolve(&ReferralCode::parse("RDXDEADBEEF")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn referred_user_binds_to_one_referrer() {
        let reg = ReferralCodeRegistry::new();
        let (first, second, friend) = (UserId::new(), UserId::new(), UserId::new());
        reg.bind_referral(first, friend).unwrap();
        let err = reg.bind_referral(second, friend).unwrap_err();
        assert!(matches!(err, RdxError::DuplicateReferral { referrer, .. } if referrer == first));
        assert_eq!(reg.referrer_of(friend), Some(first));
    }

    #[test]
    fn unbind_only_removes_own_claim() {
        let reg = ReferralCodeRegistry::new();
        let (first, second, friend) = (UserId::new(), UserId::new(), UserId::new());
        reg.bind_referral(first, friend).unwrap();
        reg.unbind_referral(second, friend);
        assert_eq!(reg.referrer_of(friend), Some(first));
        reg.unbind_referral(first, friend);
        assert_eq!(reg.referrer_of(friend), None);
        reg.bind_referral(second, friend).unwrap();
    }

    #[test]
    fn clear_forgets_codes_and_bindings() {
        let reg = ReferralCodeRegistry::new();
        let (user, friend) = (UserId::new(), UserId::new());
        let code = reg.claim(user).unwrap();
        reg.bind_referral(user, friend).unwrap();
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.resolve(&code).is_err());
        assert_eq!(reg.referrer_of(friend), None);
    }
}
