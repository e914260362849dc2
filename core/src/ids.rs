//! Identifiers for gyms, members, classes and session instances.
//!
//! Document ids are opaque strings handed out by the outer application (the
//! auth provider owns member ids, the admin UI owns gym and class ids), so the
//! newtypes wrap `String` rather than `Uuid`. The only ids derived here are the
//! composite keys that make a booking unique per session.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing id.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Tenant (gym) identifier
    GymId
);
string_id!(
    /// Member identifier (the user's auth uid)
    MemberId
);
string_id!(
    /// Class series identifier
    ClassId
);
string_id!(
    /// Membership tier identifier
    TierId
);

/// One dated occurrence of a class series.
///
/// All attendance for a session lives in a single roster document, so this key
/// is also the unit of optimistic concurrency for capacity decisions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Owning gym
    pub gym_id: GymId,
    /// Class series
    pub class_id: ClassId,
    /// Local calendar date of the session
    pub date: NaiveDate,
}

impl SessionKey {
    /// Creates a session key.
    #[must_use]
    pub const fn new(gym_id: GymId, class_id: ClassId, date: NaiveDate) -> Self {
        Self {
            gym_id,
            class_id,
            date,
        }
    }

    /// Composite attendance id for a member in this session.
    #[must_use]
    pub fn attendance_id(&self, member_id: &MemberId) -> AttendanceId {
        AttendanceId::new(&self.class_id, self.date, member_id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}_{}", self.gym_id, self.class_id, self.date.format("%Y-%m-%d"))
    }
}

/// Deterministic booking identifier: `{classId}_{YYYY-MM-DD}_{memberId}`.
///
/// Re-booking a cancelled slot derives the same id and reuses the record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceId(String);

impl AttendanceId {
    /// Derives the composite id.
    #[must_use]
    pub fn new(class_id: &ClassId, date: NaiveDate, member_id: &MemberId) -> Self {
        Self(format!("{}_{}_{}", class_id, date.format("%Y-%m-%d"), member_id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a member's weekly usage counter at one gym.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsageKey {
    /// Gym the bookings belong to
    pub gym_id: GymId,
    /// Member being counted
    pub member_id: MemberId,
    /// Monday of the ISO week
    pub week_start: NaiveDate,
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.gym_id,
            self.member_id,
            self.week_start.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn attendance_id_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let session = SessionKey::new("gym-1".into(), "yoga".into(), date);

        let first = session.attendance_id(&"alice".into());
        let second = AttendanceId::new(&"yoga".into(), date, &"alice".into());

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "yoga_2025-03-04_alice");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&MemberId::new("m-42")).unwrap();
        assert_eq!(json, "\"m-42\"");
    }
}
