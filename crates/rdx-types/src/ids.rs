//! Identifiers used throughout the RDX engine.
//!
//! Entity IDs use UUIDv7 for time-ordered lexicographic sorting, which gives
//! ledger entries a natural `(user, created_at)` ordering for free.
//! Referral codes are short, human-shareable strings derived from the user id.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Authenticated user identity, supplied by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// Ledger entry identifier. UUIDv7, so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ReferralCode
// ---------------------------------------------------------------------------

/// A user's referral code, e.g. `RDX3FA09C1B`. Assigned once, never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReferralCode(pub String);

impl ReferralCode {
    /// Deterministic candidate code for `(user, attempt)`.
    ///
    /// `attempt` is bumped by the registry when a candidate collides with a
    /// code already owned by someone else.
    #[must_use]
    pub fn derive(user_id: UserId, attempt: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"rdx:referral_code:v1:");
        hasher.update(user_id.0.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let hash = hasher.finalize();
        let suffix = hex::encode_upper(&hash[..constants::REFERRAL_CODE_HEX_LEN / 2]);
        Self(format!("{}{suffix}", constants::REFERRAL_CODE_PREFIX))
    }

    /// Normalise user input (trim + uppercase) into a code.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_uniqueness() {
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn entry_id_ordering() {
        let a = EntryId::new();
        let b = EntryId::new();
        assert!(a < b);
    }

    #[test]
    fn referral_code_shape() {
        let code = ReferralCode::derive(UserId::new(), 0);
        assert!(code.as_str().starts_with("RDX"));
        assert_eq!(code.as_str().len(), 3 + constants::REFERRAL_CODE_HEX_LEN);
        assert!(code.as_str()[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn referral_code_deterministic_per_attempt() {
        let user = UserId::new();
        assert_eq!(ReferralCode::derive(user, 0), ReferralCode::derive(user, 0));
        assert_ne!(ReferralCode::derive(user, 0), ReferralCode::derive(user, 1));
    }

    #[test]
    fn referral_code_parse_normalises() {
        assert_eq!(ReferralCode::parse("  rdx00ab12cd "), ReferralCode("RDX00AB12CD".into()));
    }
}
