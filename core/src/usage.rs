//! Per-member weekly booking counters.
//!
//! Weekly caps are checked against a counter document maintained by every
//! booking and cancellation, instead of counting attendance records at booking
//! time.

use crate::ids::{GymId, MemberId, UsageKey};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Live bookings a member holds at one gym in one ISO week.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyUsage {
    /// Counter key
    pub key: UsageKey,
    /// Non-cancelled bookings in the week
    pub bookings: u32,
}

impl WeeklyUsage {
    /// A zeroed counter.
    #[must_use]
    pub const fn empty(key: UsageKey) -> Self {
        Self { key, bookings: 0 }
    }

    /// Counter key for the week containing `session_date`.
    #[must_use]
    pub fn key_for(gym_id: GymId, member_id: MemberId, session_date: NaiveDate) -> UsageKey {
        UsageKey {
            gym_id,
            member_id,
            week_start: week_start(session_date),
        }
    }

    /// Counts one more booking.
    pub const fn increment(&mut self) {
        self.bookings = self.bookings.saturating_add(1);
    }

    /// Counts one fewer booking.
    pub const fn decrement(&mut self) {
        self.bookings = self.bookings.saturating_sub(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weeks_run_monday_to_sunday() {
        assert_eq!(week_start(date(2025, 1, 6)), date(2025, 1, 6));
        assert_eq!(week_start(date(2025, 1, 12)), date(2025, 1, 6));
        assert_eq!(week_start(date(2025, 1, 13)), date(2025, 1, 13));
        // Year boundary
        assert_eq!(week_start(date(2025, 1, 1)), date(2024, 12, 30));
    }

    #[test]
    fn counter_never_underflows() {
        let mut usage = WeeklyUsage::empty(WeeklyUsage::key_for(
            "gym".into(),
            "m".into(),
            date(2025, 1, 6),
        ));
        usage.decrement();
        assert_eq!(usage.bookings, 0);
        usage.increment();
        usage.increment();
        usage.decrement();
        assert_eq!(usage.bookings, 1);
    }

    proptest! {
        #[test]
        fn week_start_is_a_monday_within_six_days(offset in 0i64..20_000) {
            let day = date(1990, 1, 1) + chrono::Duration::days(offset);
            let start = week_start(day);
            prop_assert_eq!(start.weekday(), chrono::Weekday::Mon);
            prop_assert!((day - start).num_days() < 7);
            prop_assert!(start <= day);
        }
    }
}
