//! Daily check-in records and the accounting-day calendar.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Offset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntryId, RdxError, Result, UserId};

/// One check-in. Exactly one may exist per (user, day); never mutated.
///
/// `streak_day` is what the streak was when the record was written. It is
/// kept for display and audit only; streak resolution always refolds the
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub user_id: UserId,
    pub day: NaiveDate,
    pub streak_day: u8,
    pub reward: Decimal,
    pub asset: String,
    /// The reward ledger entry written in the same unit of work.
    pub entry_id: EntryId,
    pub created_at: DateTime<Utc>,
}

/// Maps instants to accounting days.
///
/// The accounting day of an instant is its calendar date after applying a
/// fixed UTC offset, so the day boundary is midnight in that offset and a
/// "yesterday" lookup is calendar-based rather than a rolling 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountingCalendar {
    offset: FixedOffset,
}

impl AccountingCalendar {
    /// Calendar with the day boundary at midnight in `utc_offset_secs`.
    ///
    /// # Errors
    /// Returns `Configuration` if the offset is outside ±24h.
    pub fn new(utc_offset_secs: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_secs).ok_or_else(|| {
            RdxError::Configuration(format!("invalid accounting UTC offset: {utc_offset_secs}s"))
        })?;
        Ok(Self { offset })
    }

    /// Calendar with the day boundary at UTC midnight.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// The accounting day `at` falls on.
    #[must_use]
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for AccountingCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// The day before `day`, or `None` at the start of the calendar.
#[must_use]
pub fn previous_day(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn utc_day_boundary() {
        let cal = AccountingCalendar::utc();
        let late = Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(cal.day_of(late), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(cal.day_of(early), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn offset_shifts_day_boundary() {
        // UTC+8: 17:00 UTC is already 01:00 the next day.
        let cal = AccountingCalendar::new(8 * 3600).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 17, 0, 0).unwrap();
        assert_eq!(cal.day_of(at), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn invalid_offset_rejected() {
        assert!(matches!(
            AccountingCalendar::new(25 * 3600),
            Err(RdxError::Configuration(_))
        ));
    }

    #[test]
    fn previous_day_crosses_month() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(previous_day(day), NaiveDate::from_ymd_opt(2025, 2, 28));
    }
}
