//! Engine configuration.
//!
//! Everything tunable per deployment lives here and is passed into the
//! engine explicitly. Unset JSON fields fall back to the defaults in
//! [`crate::constants`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountingCalendar, Asset, RdxError, Result, constants};

const TIERS: usize = constants::STREAK_CYCLE_DAYS as usize;

/// Reward paid for each streak day, day 1 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardSchedule {
    tiers: [Decimal; TIERS],
}

impl RewardSchedule {
    #[must_use]
    pub fn new(tiers: [Decimal; TIERS]) -> Self {
        Self { tiers }
    }

    /// Reward for `streak_day` (1-based). Out-of-range days are clamped into
    /// the cycle so a lookup can never fail.
    #[must_use]
    pub fn reward_for(&self, streak_day: u8) -> Decimal {
        let idx = usize::from(streak_day.clamp(1, constants::STREAK_CYCLE_DAYS)) - 1;
        self.tiers[idx]
    }

    /// `(streak_day, reward)` pairs, day 1 first.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Decimal)> + '_ {
        (1..=constants::STREAK_CYCLE_DAYS).zip(self.tiers.iter().copied())
    }

    fn validate(&self) -> Result<()> {
        for (day, reward) in self.iter() {
            if reward <= Decimal::ZERO {
                return Err(RdxError::Configuration(format!(
                    "daily reward for day {day} must be positive, got {reward}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            tiers: constants::DEFAULT_DAILY_REWARDS.map(|units| Decimal::new(units, 0)),
        }
    }
}

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Check-in reward per streak day.
    pub daily_rewards: RewardSchedule,
    /// Asset rewards are paid in. Must be in `supported_assets`.
    pub reward_asset: Asset,
    /// Assets wallets may hold.
    pub supported_assets: Vec<Asset>,
    /// Credited to the referrer per completed referral.
    pub referral_reward: Decimal,
    /// Offset of the accounting-day boundary from UTC midnight, in seconds.
    pub accounting_utc_offset_secs: i32,
    /// External deposit references remembered per user.
    pub deposit_dedup_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            daily_rewards: RewardSchedule::default(),
            reward_asset: constants::DEFAULT_REWARD_ASSET.to_string(),
            supported_assets: constants::DEFAULT_SUPPORTED_ASSETS
                .iter()
                .map(ToString::to_string)
                .collect(),
            referral_reward: Decimal::new(constants::DEFAULT_REFERRAL_REWARD, 0),
            accounting_utc_offset_secs: 0,
            deposit_dedup_capacity: constants::DEFAULT_DEPOSIT_DEDUP_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns [`RdxError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.daily_rewards.validate()?;
        if self.supported_assets.is_empty() {
            return Err(RdxError::Configuration("supported_assets is empty".into()));
        }
        if let Some(bad) = self
            .supported_assets
            .iter()
            .find(|a| a.is_empty() || a.trim() != a.as_str())
        {
            return Err(RdxError::Configuration(format!("malformed asset symbol: {bad:?}")));
        }
        if !self.is_supported(&self.reward_asset) {
            return Err(RdxError::Configuration(format!(
                "reward asset {} is not a supported asset",
                self.reward_asset
            )));
        }
        if self.referral_reward <= Decimal::ZERO {
            return Err(RdxError::Configuration(format!(
                "referral_reward must be positive, got {}",
                self.referral_reward
            )));
        }
        if self.deposit_dedup_capacity == 0 {
            return Err(RdxError::Configuration("deposit_dedup_capacity must be > 0".into()));
        }
        self.calendar().map(|_| ())
    }

    #[must_use]
    pub fn is_supported(&self, asset: &str) -> bool {
        self.supported_assets.iter().any(|a| a == asset)
    }

    /// # Errors
    /// Returns [`RdxError::UnsupportedAsset`] for unknown assets.
    pub fn ensure_supported(&self, asset: &str) -> Result<()> {
        if self.is_supported(asset) {
            Ok(())
        } else {
            Err(RdxError::UnsupportedAsset(asset.to_string()))
        }
    }

    /// Accounting calendar derived from `accounting_utc_offset_secs`.
    pub fn calendar(&self) -> Result<AccountingCalendar> {
        AccountingCalendar::new(self.accounting_utc_offset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_matches_tiers() {
        let schedule = RewardSchedule::default();
        let rewards: Vec<Decimal> = schedule.iter().map(|(_, r)| r).collect();
        let expected: Vec<Decimal> = [5, 10, 15, 20, 25, 30, 50]
            .into_iter()
            .map(|n| Decimal::new(n, 0))
            .collect();
        assert_eq!(rewards, expected);
        assert_eq!(schedule.reward_for(7), Decimal::new(50, 0));
    }

    #[test]
    fn reward_for_clamps() {
        let schedule = RewardSchedule::default();
        assert_eq!(schedule.reward_for(0), Decimal::new(5, 0));
        assert_eq!(schedule.reward_for(42), Decimal::new(50, 0));
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert!(cfg.is_supported("USDT"));
        assert!(cfg.is_supported("RDX"));
        assert!(!cfg.is_supported("DOGE"));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "referral_reward": "25.5" }"#).unwrap();
        assert_eq!(cfg.referral_reward, Decimal::new(255, 1));
        assert_eq!(cfg.reward_asset, "RDX");
        assert_eq!(cfg.daily_rewards, RewardSchedule::default());
    }

    #[test]
    fn schedule_from_json_array() {
        let cfg = EngineConfig::from_json(
            r#"{ "daily_rewards": ["1", "2", "3", "4", "5", "6", "100"] }"#,
        )
        .unwrap();
        assert_eq!(cfg.daily_rewards.reward_for(7), Decimal::new(100, 0));
    }

    #[test]
    fn reward_asset_must_be_supported() {
        let err = EngineConfig::from_json(r#"{ "reward_asset": "DOGE" }"#).unwrap_err();
        assert!(matches!(err, RdxError::Configuration(_)));
    }

    #[test]
    fn non_positive_tier_rejected() {
        let err = EngineConfig::from_json(
            r#"{ "daily_rewards": ["1", "2", "0", "4", "5", "6", "7"] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("day 3"));
    }

    #[test]
    fn wrong_tier_count_is_serialization_error() {
        let err = EngineConfig::from_json(r#"{ "daily_rewards": ["1", "2"] }"#).unwrap_err();
        assert!(matches!(err, RdxError::Serialization(_)));
    }

    #[test]
    fn ensure_supported_reports_asset() {
        let err = EngineConfig::default().ensure_supported("DOGE").unwrap_err();
        assert!(matches!(err, RdxError::UnsupportedAsset(ref a) if a == "DOGE"));
    }
}
