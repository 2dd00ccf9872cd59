//! Daily check-in history and streak resolution.
//!
//! The streak is never stored as state: it is recomputed from the run of
//! consecutive accounting days ending at the day in question, cycled at
//! [`constants::STREAK_CYCLE_DAYS`]. The `streak_day` cached on each
//! [`CheckIn`] record is informational only.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rdx_types::{CheckIn, RdxError, Result, UserId, constants, previous_day};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of resolving "today" against the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakResolution {
    pub day: NaiveDate,
    /// Streak day a check-in on `day` gets (or got, if already checked in).
    pub streak_day: u8,
    pub can_check_in: bool,
    /// Most recent check-in strictly before `day`.
    pub previous: Option<NaiveDate>,
}

/// One cell of the check-in calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInDay {
    pub day: NaiveDate,
    pub checked: bool,
    /// Streak day reached on `day`; `None` if not checked in.
    pub streak_day: Option<u8>,
    /// Reward paid on `day`; `None` if not checked in.
    pub reward: Option<Decimal>,
}

/// One user's check-in history, keyed by accounting day.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    user_id: UserId,
    history: BTreeMap<NaiveDate, CheckIn>,
}

impl StreakTracker {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            history: BTreeMap::new(),
        }
    }

    /// Resolve the streak day for a check-in on `today`.
    #[must_use]
    pub fn resolve(&self, today: NaiveDate) -> StreakResolution {
        let previous = self.history.range(..today).next_back().map(|(d, _)| *d);
        if self.history.contains_key(&today) {
            return StreakResolution {
                day: today,
                streak_day: self.streak_on(today),
                can_check_in: false,
                previous,
            };
        }
        let streak_day = match (previous, previous_day(today)) {
            (Some(prev), Some(yesterday)) if prev == yesterday => {
                self.streak_on(yesterday) % constants::STREAK_CYCLE_DAYS + 1
            }
            _ => 1,
        };
        StreakResolution {
            day: today,
            streak_day,
            can_check_in: !self.has_later_than(today),
            previous,
        }
    }

    /// Streak day reached on `day`, or 0 if there is no check-in that day.
    #[must_use]
    pub fn streak_on(&self, day: NaiveDate) -> u8 {
        let mut run: u64 = 0;
        let mut cursor = Some(day);
        while let Some(d) = cursor {
            if !self.history.contains_key(&d) {
                break;
            }
            run += 1;
            cursor = previous_day(d);
        }
        if run == 0 {
            return 0;
        }
        let cycle = u64::from(constants::STREAK_CYCLE_DAYS);
        // (run - 1) % cycle < cycle <= u8::MAX
        u8::try_from((run - 1) % cycle + 1).unwrap_or(constants::STREAK_CYCLE_DAYS)
    }

    /// Streak as seen on `today`: today's if checked in, else yesterday's, else 0.
    #[must_use]
    pub fn current_streak(&self, today: NaiveDate) -> u8 {
        if self.history.contains_key(&today) {
            return self.streak_on(today);
        }
        previous_day(today).map_or(0, |yesterday| self.streak_on(yesterday))
    }

    /// Store a check-in.
    ///
    /// # Errors
    /// - `AlreadyCheckedIn` if one exists for the same day
    /// - `StaleCheckIn` if a later day is already recorded
    pub fn record(&mut self, check_in: CheckIn) -> Result<()> {
        if self.history.contains_key(&check_in.day) {
            return Err(RdxError::AlreadyCheckedIn {
                user: self.user_id,
                day: check_in.day,
            });
        }
        if let Some(latest) = self.latest() {
            if latest > check_in.day {
                return Err(RdxError::StaleCheckIn {
                    day: check_in.day,
                    latest,
                });
            }
        }
        self.history.insert(check_in.day, check_in);
        Ok(())
    }

    /// Days `today - 6 ..= today`, oldest first.
    #[must_use]
    pub fn calendar(&self, today: NaiveDate) -> Vec<CheckInDay> {
        let span = u64::from(constants::CHECK_IN_CALENDAR_DAYS);
        (0..span)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|day| match self.history.get(&day) {
                Some(record) => CheckInDay {
                    day,
                    checked: true,
                    streak_day: Some(self.streak_on(day)),
                    reward: Some(record.reward),
                },
                None => CheckInDay {
                    day,
                    checked: false,
                    streak_day: None,
                    reward: None,
                },
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, day: NaiveDate) -> Option<&CheckIn> {
        self.history.get(&day)
    }

    #[must_use]
    pub fn latest(&self) -> Option<NaiveDate> {
        self.history.keys().next_back().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub(crate) fn forget(&mut self, day: NaiveDate) {
        self.history.remove(&day);
    }

    fn has_later_than(&self, day: NaiveDate) -> bool {
        self.latest().is_some_and(|latest| latest > day)
    }
}
