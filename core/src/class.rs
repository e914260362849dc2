//! Class series: the recurring (or one-off) definition sessions are booked
//! against.

use crate::gym::BookingRules;
use crate::ids::{ClassId, GymId, TierId};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Effective capacity of a class with no (or a zero) `max_capacity`.
pub const UNLIMITED_CAPACITY: u32 = 999;

/// When a class series takes place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Weekly on the given days, from `start_date` onwards
    Recurring {
        /// Days of the week the class runs
        days: Vec<Weekday>,
        /// First date the series runs
        start_date: NaiveDate,
        /// Last date the series runs, if it ends
        #[serde(default)]
        end_date: Option<NaiveDate>,
    },
    /// A single event
    Single {
        /// The event date
        date: NaiveDate,
    },
}

/// A class series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSeries {
    /// Class id
    pub id: ClassId,
    /// Owning gym
    pub gym_id: GymId,
    /// Display name
    pub name: String,
    /// Dates the class runs
    pub schedule: Schedule,
    /// Local start time
    pub time: NaiveTime,
    /// Length of a session
    pub duration_minutes: u32,
    /// Seat limit; `None` or `0` means unlimited
    pub max_capacity: Option<u32>,
    /// Credits charged to non-members
    pub credit_cost: u32,
    /// Whether a free class may be booked without a plan
    pub drop_in_enabled: bool,
    /// Tiers whose members book for free
    #[serde(default)]
    pub allowed_membership_ids: Vec<TierId>,
    /// Individual sessions that were called off
    #[serde(default)]
    pub cancelled_dates: Vec<NaiveDate>,
    /// Overrides of the gym's booking rules
    #[serde(default)]
    pub booking_rules: Option<BookingRules>,
    /// Retired series keep their history but take no new bookings
    #[serde(default)]
    pub archived: bool,
}

impl ClassSeries {
    /// Seat limit with the unlimited sentinel applied.
    #[must_use]
    pub fn effective_capacity(&self) -> u32 {
        match self.max_capacity {
            Some(0) | None => UNLIMITED_CAPACITY,
            Some(capacity) => capacity,
        }
    }

    /// Whether members of `tier_id` book this class through their plan.
    #[must_use]
    pub fn allows_tier(&self, tier_id: &TierId) -> bool {
        self.allowed_membership_ids.contains(tier_id)
    }

    /// Whether a session of this series takes place on `date`.
    #[must_use]
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        if self.cancelled_dates.contains(&date) {
            return false;
        }
        match &self.schedule {
            Schedule::Single { date: single } => *single == date,
            Schedule::Recurring {
                days,
                start_date,
                end_date,
            } => {
                date >= *start_date
                    && end_date.is_none_or(|end| date <= end)
                    && days.contains(&date.weekday())
            }
        }
    }

    /// Start instant of the session on `date`, resolved in the gym's timezone.
    ///
    /// A repeated local time (DST fall-back) resolves to its first occurrence.
    /// A local time skipped by a DST gap is read with the offset in force
    /// before the gap, so it lands as far past the gap as it was into it.
    #[must_use]
    pub fn starts_at(&self, date: NaiveDate, timezone: Tz) -> DateTime<Utc> {
        let local = date.and_time(self.time);
        if let Some(start) = timezone.from_local_datetime(&local).earliest() {
            return start.with_timezone(&Utc);
        }
        let offset_seconds = timezone
            .from_local_datetime(&(local - Duration::hours(3)))
            .earliest()
            .map_or(0, |before| before.offset().fix().local_minus_utc());
        Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset_seconds))))
    }
}
