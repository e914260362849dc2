//! Attendance records and the per-session roster document.

use crate::ids::{AttendanceId, MemberId, SessionKey};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of one member's place in one session.
///
/// ```text
/// waitlisted ──promote──► booked ──check in──► attended
///      │                    │  └──no show──► no-show
///      └──────cancel────────┴────────────────► cancelled ──re-book──► booked | waitlisted
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    /// Holds a seat
    Booked,
    /// Queued for a seat
    Waitlisted,
    /// Checked in
    Attended,
    /// Gave up the place (record kept for audit)
    Cancelled,
    /// Held a seat but never showed up
    NoShow,
}

impl AttendanceStatus {
    /// Whether the record occupies a seat.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Booked | Self::Attended)
    }

    /// Whether the record still counts as a booking (everything but cancelled).
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Waitlisted => "waitlisted",
            Self::Attended => "attended",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a booking was paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingType {
    /// Covered by the member's plan
    Membership,
    /// Paid with class credits
    Credit,
    /// Free class open to everyone
    DropIn,
    /// Granted by an admin
    Comp,
}

impl BookingType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::Credit => "credit",
            Self::DropIn => "drop-in",
            Self::Comp => "comp",
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member's booking for one session, with display fields denormalized so
/// rosters render without joins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Composite id
    pub id: AttendanceId,
    /// Session this record belongs to
    pub session: SessionKey,
    /// Member holding the booking
    pub member_id: MemberId,
    /// Current state
    pub status: AttendanceStatus,
    /// How access was granted
    pub booking_type: BookingType,
    /// Credits charged for this booking
    pub cost_used: u32,
    /// When the member joined the roster or waitlist (FIFO key)
    pub booked_at: DateTime<Utc>,
    /// When the record was last cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the record moved off the waitlist
    pub promoted_at: Option<DateTime<Utc>>,
    /// When the member checked in
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Whether `cost_used` was returned
    pub refunded: bool,
    /// Whether the cancellation happened inside the cancellation window
    pub late_cancel: bool,
    /// Member name at booking time
    pub member_name: String,
    /// Member photo at booking time
    pub member_photo: Option<String>,
    /// Class name at booking time
    pub class_name: String,
    /// Class start time at booking time
    pub class_time: NaiveTime,
}

/// All attendance records of one session, keyed by member.
///
/// Keying by member makes a second live record for the same member
/// unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRoster {
    /// Session this roster belongs to
    pub session: SessionKey,
    /// Records by member
    pub records: BTreeMap<MemberId, AttendanceRecord>,
}

impl SessionRoster {
    /// An empty roster.
    #[must_use]
    pub const fn empty(session: SessionKey) -> Self {
        Self {
            session,
            records: BTreeMap::new(),
        }
    }

    /// The member's record, if any.
    #[must_use]
    pub fn record(&self, member_id: &MemberId) -> Option<&AttendanceRecord> {
        self.records.get(member_id)
    }

    /// Number of records holding a seat.
    #[must_use]
    pub fn active_count(&self) -> u32 {
        let active = self.records.values().filter(|r| r.status.is_active()).count();
        u32::try_from(active).unwrap_or(u32::MAX)
    }

    /// Waitlisted records in promotion order: earliest `booked_at` first,
    /// member id breaking ties.
    #[must_use]
    pub fn waitlist(&self) -> Vec<&AttendanceRecord> {
        let mut waitlist: Vec<_> = self
            .records
            .values()
            .filter(|r| r.status == AttendanceStatus::Waitlisted)
            .collect();
        waitlist.sort_by(|a, b| {
            a.booked_at
                .cmp(&b.booked_at)
                .then_with(|| a.member_id.cmp(&b.member_id))
        });
        waitlist
    }

    /// Number of waitlisted records.
    #[must_use]
    pub fn waitlist_len(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == AttendanceStatus::Waitlisted)
            .count()
    }
}
