//! Ready-made catalog and member documents.
//!
//! Defaults: gym `gym-1` in UTC with a 120 minute cancellation window; class
//! `hiit` runs daily at 18:00 from 2025-01-01 with 10 seats and a cost of one
//! credit; sessions are booked for [`session_date`] (Wednesday 2025-01-08).

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use gymbook_core::{
    BookingRules, ClassSeries, Gym, GymId, GymMembership, LateCancelPolicy, Member,
    MembershipStatus, MembershipTier, Schedule, SessionKey, TierId,
};

/// 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Builds a date, falling back to the Unix epoch for impossible inputs.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Default session date: Wednesday 2025-01-08.
#[must_use]
pub fn session_date() -> NaiveDate {
    date(2025, 1, 8)
}

/// Default gym id.
#[must_use]
pub fn gym_id() -> GymId {
    GymId::new("gym-1")
}

/// Default session of the default class.
#[must_use]
pub fn session() -> SessionKey {
    SessionKey::new(gym_id(), "hiit".into(), session_date())
}

/// A gym in UTC with a two hour cancellation window.
#[must_use]
pub fn gym() -> Gym {
    Gym {
        id: gym_id(),
        name: "Iron Temple".to_string(),
        timezone: chrono_tz::UTC,
        booking_rules: BookingRules {
            cancellation_window_minutes: Some(120),
            late_cancel_policy: Some(LateCancelPolicy::Forfeit),
        },
        owner_id: Some("owner".into()),
        stripe_account_id: None,
    }
}

/// Daily 18:00 class with 10 seats, one credit, no drop-ins.
#[must_use]
pub fn class(id: &str) -> ClassSeries {
    ClassSeries {
        id: id.into(),
        gym_id: gym_id(),
        name: id.to_uppercase(),
        schedule: Schedule::Recurring {
            days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            start_date: date(2025, 1, 1),
            end_date: None,
        },
        time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
        duration_minutes: 45,
        max_capacity: Some(10),
        credit_cost: 1,
        drop_in_enabled: false,
        allowed_membership_ids: Vec::new(),
        cancelled_dates: Vec::new(),
        booking_rules: None,
        archived: false,
    }
}

/// A tier of the default gym.
#[must_use]
pub fn tier(id: &str, weekly_limit: Option<u32>) -> MembershipTier {
    MembershipTier {
        id: id.into(),
        gym_id: gym_id(),
        name: id.to_uppercase(),
        weekly_limit,
    }
}

/// An active account with `credits` and no memberships.
#[must_use]
pub fn member(id: &str, credits: i64) -> Member {
    let mut member = Member::new(id.into(), id.to_uppercase(), epoch());
    member.class_credits = credits;
    member.status = MembershipStatus::Active;
    member
}

/// An active account holding `tier_id` at the default gym with `status`.
#[must_use]
pub fn member_with_plan(id: &str, tier_id: &str, status: MembershipStatus) -> Member {
    let mut member = member(id, 0);
    member.memberships.push(GymMembership {
        gym_id: gym_id(),
        tier_id: TierId::new(tier_id),
        status,
    });
    member
}
