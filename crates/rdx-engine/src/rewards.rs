//! Reward accrual: daily check-ins, referrals, bonuses.
//!
//! Every reward is a completed `reward` ledger entry in the configured
//! reward asset, credited to `available` in the same unit of work that
//! records the check-in or referral.

use chrono::{DateTime, Utc};
use rdx_types::{
    Bucket, CheckIn, EntryFilter, EntryKind, EntryStatus, LedgerEntry, Notification,
    NotificationCategory, Page, Paged, RdxError, ReferralCode, ReferralRecord, Result,
    RewardSchedule, UserId, validate_amount,
};
use rust_decimal::Decimal;

use crate::engine::RewardEngine;
use crate::outcome::{CheckInOutcome, CheckInStatus, ReferralOutcome};

const SOURCE_DAILY_LOGIN: &str = "daily_login";
const SOURCE_REFERRAL: &str = "referral";
const SOURCE_BONUS: &str = "bonus";

impl RewardEngine {
    // ------------------------------------------------------------------
    // Daily check-in
    // ------------------------------------------------------------------

    /// Check in for the accounting day containing `at`.
    ///
    /// # Errors
    /// - `AlreadyCheckedIn` if the user already checked in that day
    /// - `StaleCheckIn` if a later day is already recorded
    /// - `WalletNotFound` for unknown users
    pub fn check_in(&self, user: UserId, at: DateTime<Utc>) -> Result<CheckInOutcome> {
        let today = self.calendar.day_of(at);
        let asset = self.config.reward_asset.as_str();

        let outcome = self.write_book("check_in", user, |uow| {
            let resolution = uow.book().streak().resolve(today);
            let streak_day = resolution.streak_day;
            let reward = self.config.daily_rewards.reward_for(streak_day);

            let entry = LedgerEntry::new(user, EntryKind::Reward, asset, reward, EntryStatus::Completed)
                .with_description(format!("Daily check-in reward, day {streak_day}"))
                .with_meta("source", SOURCE_DAILY_LOGIN)
                .with_meta("streak_day", streak_day)
                .with_meta("accounting_day", today.to_string());
            let check_in = CheckIn {
                user_id: user,
                day: today,
                streak_day,
                reward,
                asset: asset.to_string(),
                entry_id: entry.id,
                created_at: at,
            };

            uow.record_check_in(check_in.clone())?;
            uow.append(entry.clone())?;
            uow.credit(asset, reward, Bucket::Available)?;
            let balance = uow.book().wallet().balance(asset);
            Ok(CheckInOutcome {
                check_in,
                entry,
                balance,
            })
        })?;

        tracing::info!(
            user = %user,
            day = %today,
            streak_day = outcome.streak_day(),
            reward = %outcome.reward(),
            "Daily check-in"
        );
        self.notify(Notification::new(
            user,
            "Daily Reward Claimed",
            format!(
                "You earned {} {asset} for day {} of your streak",
                outcome.reward(),
                outcome.streak_day()
            ),
            NotificationCategory::Reward,
        ));
        Ok(outcome)
    }

    /// Streak, eligibility and the last seven days as seen at `at`.
    ///
    /// # Errors
    /// `WalletNotFound` for unknown users.
    pub fn check_in_status(&self, user: UserId, at: DateTime<Utc>) -> Result<CheckInStatus> {
        let today = self.calendar.day_of(at);
        self.read_book(user, |book| {
            let tracker = book.streak();
            let resolution = tracker.resolve(today);
            CheckInStatus {
                today,
                current_streak: tracker.current_streak(today),
                can_check_in: resolution.can_check_in,
                next_streak_day: resolution.streak_day,
                next_reward: self.config.daily_rewards.reward_for(resolution.streak_day),
                calendar: tracker.calendar(today),
            }
        })
    }

    #[must_use]
    pub fn daily_rewards(&self) -> &RewardSchedule {
        &self.config.daily_rewards
    }

    // ------------------------------------------------------------------
    // Referrals
    // ------------------------------------------------------------------

    /// The user's referral record, created on first access.
    ///
    /// # Errors
    /// `WalletNotFound`, `ReferralCodeExhausted`.
    pub fn referral_info(&self, user: UserId) -> Result<ReferralRecord> {
        self.write_book("referral_info", user, |uow| {
            let code = self.referral_codes.claim(user)?;
            Ok(uow.referral_mut(code).record().clone())
        })
    }

    /// The user's referral code, assigned on first access.
    ///
    /// # Errors
    /// `WalletNotFound`, `ReferralCodeExhausted`.
    pub fn referral_code(&self, user: UserId) -> Result<ReferralCode> {
        self.referral_info(user).map(|record| record.code)
    }

    /// Credit `referrer` for bringing in `referred`.
    ///
    /// # Errors
    /// - `SelfReferral`
    /// - `DuplicateReferral` if `referred` was already credited to any referrer
    /// - `WalletNotFound` for either user
    pub fn credit_referral(&self, referrer: UserId, referred: UserId) -> Result<ReferralOutcome> {
        let precheck = if referrer == referred {
            Err(RdxError::SelfReferral(referrer))
        } else if !self.has_wallet(referred) {
            Err(RdxError::WalletNotFound(referred))
        } else {
            Ok(())
        };
        self.finish("credit_referral", referrer, precheck)?;

        let reward = self.config.referral_reward;
        let asset = self.config.reward_asset.as_str();
        let mut bound = false;
        let outcome = self.write_book("credit_referral", referrer, |uow| {
            let code = self.referral_codes.claim(referrer)?;
            self.referral_codes.bind_referral(referrer, referred)?;
            bound = true;
            uow.referral_mut(code).credit(referred, reward)?;

            let entry = LedgerEntry::new(referrer, EntryKind::Reward, asset, reward, EntryStatus::Completed)
                .with_description("Referral reward")
                .with_meta("source", SOURCE_REFERRAL)
                .with_meta("referred_user", referred.to_string());
            uow.append(entry.clone())?;
            uow.credit(asset, reward, Bucket::Available)?;

            let record = uow
                .book()
                .referral()
                .map(|ledger| ledger.record().clone())
                .ok_or_else(|| RdxError::Internal("referral ledger missing after credit".into()))?;
            Ok(ReferralOutcome {
                referrer,
                referred,
                entry,
                record,
            })
        });
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if bound {
                    self.referral_codes.unbind_referral(referrer, referred);
                }
                return Err(err);
            }
        };

        tracing::info!(
            referrer = %referrer,
            referred = %referred,
            reward = %reward,
            total_referrals = outcome.record.total_referrals(),
            "Referral credited"
        );
        self.notify(Notification::new(
            referrer,
            "Referral Reward",
            format!("A friend joined with your code. You earned {reward} {asset}"),
            NotificationCategory::Reward,
        ));
        Ok(outcome)
    }

    /// [`Self::credit_referral`] for the owner of a referral code.
    ///
    /// # Errors
    /// `ReferralCodeNotFound`, plus everything `credit_referral` returns.
    pub fn redeem_referral_code(&self, code: &str, referred: UserId) -> Result<ReferralOutcome> {
        let code = ReferralCode::parse(code);
        let referrer = self.finish("redeem_referral_code", referred, self.referral_codes.resolve(&code))?;
        self.credit_referral(referrer, referred)
    }

    /// Mark all pending referral earnings as seen. Returns the amount
    /// acknowledged; balances are unaffected.
    ///
    /// # Errors
    /// `WalletNotFound`, `ReferralCodeExhausted`.
    pub fn acknowledge_referral_rewards(&self, user: UserId) -> Result<Decimal> {
        let acknowledged = self.write_book("acknowledge_referral_rewards", user, |uow| {
            let code = self.referral_codes.claim(user)?;
            Ok(uow.referral_mut(code).acknowledge())
        })?;
        tracing::debug!(user = %user, amount = %acknowledged, "Referral rewards acknowledged");
        Ok(acknowledged)
    }

    // ------------------------------------------------------------------
    // Bonuses & history
    // ------------------------------------------------------------------

    /// Grant a one-off bonus in the reward asset.
    ///
    /// # Errors
    /// `InvalidAmount`, `WalletNotFound`.
    pub fn grant_bonus(&self, user: UserId, amount: Decimal, reason: &str) -> Result<LedgerEntry> {
        self.finish("grant_bonus", user, validate_amount(amount))?;
        let asset = self.config.reward_asset.as_str();
        let entry = LedgerEntry::new(user, EntryKind::Reward, asset, amount, EntryStatus::Completed)
            .with_description(format!("Bonus: {reason}"))
            .with_meta("source", SOURCE_BONUS)
            .with_meta("reason", reason);

        let entry = self.write_book("grant_bonus", user, |uow| {
            uow.append(entry.clone())?;
            uow.credit(asset, amount, Bucket::Available)?;
            Ok(entry)
        })?;
        tracing::info!(user = %user, entry = %entry.id, amount = %amount, reason, "Bonus granted");
        self.notify(Notification::new(
            user,
            "Bonus Received",
            format!("You received a bonus of {amount} {asset}: {reason}"),
            NotificationCategory::Reward,
        ));
        Ok(entry)
    }

    /// Reward entries, newest first.
    ///
    /// # Errors
    /// `WalletNotFound`.
    pub fn reward_history(&self, user: UserId, page: Page) -> Result<Paged<LedgerEntry>> {
        self.history(user, &EntryFilter::all().kind(EntryKind::Reward), page)
    }
}
