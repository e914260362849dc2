//! Capacity and waitlist rules over a [`SessionRoster`].
//!
//! A record holds a seat while it is `booked` or `attended`. New bookings take
//! a seat only when one is free and nobody is queued ahead of them; otherwise
//! they join the waitlist. Seats freed later go to the waitlist in FIFO order
//! (earliest `booked_at`, member id breaking ties).

use chrono::{DateTime, Utc};
use gymbook_core::{AttendanceStatus, MemberId, SessionRoster};

/// Where a new booking lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Takes a seat
    Booked,
    /// Joins the queue
    Waitlisted,
}

impl Placement {
    /// Record status for this placement.
    #[must_use]
    pub const fn status(self) -> AttendanceStatus {
        match self {
            Self::Booked => AttendanceStatus::Booked,
            Self::Waitlisted => AttendanceStatus::Waitlisted,
        }
    }
}

/// Seats not taken by active records.
#[must_use]
pub fn free_seats(roster: &SessionRoster, capacity: u32) -> u32 {
    capacity.saturating_sub(roster.active_count())
}

/// Place a new booking. `force` seats the member even when the class is full
/// or others are waiting.
#[must_use]
pub fn place(roster: &SessionRoster, capacity: u32, force: bool) -> Placement {
    if force || (free_seats(roster, capacity) > 0 && roster.waitlist_len() == 0) {
        Placement::Booked
    } else {
        Placement::Waitlisted
    }
}

/// Move the head of the waitlist into a seat.
///
/// Does not look at capacity; callers decide a seat is available.
pub fn promote_next(roster: &mut SessionRoster, now: DateTime<Utc>) -> Option<MemberId> {
    let next = roster.waitlist().first().map(|record| record.member_id.clone())?;
    let record = roster.records.get_mut(&next)?;
    record.status = AttendanceStatus::Booked;
    record.promoted_at = Some(now);
    Some(next)
}

/// Promote the head of the waitlist if a seat is free after a record left.
pub fn promote_into_freed_seat(
    roster: &mut SessionRoster,
    capacity: u32,
    now: DateTime<Utc>,
) -> Option<MemberId> {
    if free_seats(roster, capacity) == 0 {
        return None;
    }
    promote_next(roster, now)
}

/// Promote waitlisted records, FIFO, until seats or the queue run out.
pub fn fill_open_seats(
    roster: &mut SessionRoster,
    capacity: u32,
    now: DateTime<Utc>,
) -> Vec<MemberId> {
    let mut promoted = Vec::new();
    while free_seats(roster, capacity) > 0 {
        match promote_next(roster, now) {
            Some(member_id) => promoted.push(member_id),
            None => break,
        }
    }
    promoted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gymbook_core::{AttendanceRecord, BookingType};
    use gymbook_testing::fixtures;

    fn record(member: &str, status: AttendanceStatus, minute: i64) -> AttendanceRecord {
        let session = fixtures::session();
        AttendanceRecord {
            id: session.attendance_id(&member.into()),
            session,
            member_id: member.into(),
            status,
            booking_type: BookingType::Credit,
            cost_used: 1,
            booked_at: fixtures::epoch() + Duration::minutes(minute),
            cancelled_at: None,
            promoted_at: None,
            checked_in_at: None,
            refunded: false,
            late_cancel: false,
            member_name: member.to_uppercase(),
            member_photo: None,
            class_name: "HIIT".to_string(),
            class_time: chrono::NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        }
    }

    fn roster(records: Vec<AttendanceRecord>) -> SessionRoster {
        let mut roster = SessionRoster::empty(fixtures::session());
        for r in records {
            roster.records.insert(r.member_id.clone(), r);
        }
        roster
    }

    #[test]
    fn books_while_seats_are_free() {
        let roster = roster(vec![record("a", AttendanceStatus::Booked, 0)]);
        assert_eq!(place(&roster, 2, false), Placement::Booked);
        assert_eq!(place(&roster, 1, false), Placement::Waitlisted);
    }

    #[test]
    fn attended_records_hold_seats_and_cancelled_do_not() {
        let roster = roster(vec![
            record("a", AttendanceStatus::Attended, 0),
            record("b", AttendanceStatus::Cancelled, 1),
            record("c", AttendanceStatus::NoShow, 2),
        ]);
        assert_eq!(free_seats(&roster, 2), 1);
    }

    #[test]
    fn a_free_seat_does_not_skip_the_queue() {
        let roster = roster(vec![record("a", AttendanceStatus::Waitlisted, 0)]);
        assert_eq!(place(&roster, 5, false), Placement::Waitlisted);
    }

    #[test]
    fn force_always_books() {
        let roster = roster(vec![
            record("a", AttendanceStatus::Booked, 0),
            record("b", AttendanceStatus::Waitlisted, 1),
        ]);
        assert_eq!(place(&roster, 1, true), Placement::Booked);
    }

    #[test]
    fn promotion_picks_earliest_then_lowest_member_id() {
        let mut roster = roster(vec![
            record("zed", AttendanceStatus::Waitlisted, 5),
            record("bob", AttendanceStatus::Waitlisted, 3),
            record("amy", AttendanceStatus::Waitlisted, 3),
        ]);
        let now = fixtures::epoch() + Duration::hours(1);

        assert_eq!(promote_next(&mut roster, now), Some("amy".into()));
        assert_eq!(promote_next(&mut roster, now), Some("bob".into()));

        let amy = roster.record(&"amy".into()).unwrap();
        assert_eq!(amy.status, AttendanceStatus::Booked);
        assert_eq!(amy.promoted_at, Some(now));
    }

    #[test]
    fn fill_open_seats_stops_at_capacity() {
        let mut roster = roster(vec![
            record("a", AttendanceStatus::Booked, 0),
            record("b", AttendanceStatus::Waitlisted, 1),
            record("c", AttendanceStatus::Waitlisted, 2),
            record("d", AttendanceStatus::Waitlisted, 3),
        ]);

        let promoted = fill_open_seats(&mut roster, 3, fixtures::epoch());

        assert_eq!(promoted, vec![MemberId::from("b"), MemberId::from("c")]);
        assert_eq!(roster.active_count(), 3);
        assert_eq!(roster.waitlist_len(), 1);
    }

    #[test]
    fn full_session_promotes_nobody() {
        let mut roster = roster(vec![
            record("a", AttendanceStatus::Booked, 0),
            record("b", AttendanceStatus::Waitlisted, 1),
        ]);
        assert!(fill_open_seats(&mut roster, 1, fixtures::epoch()).is_empty());
        assert!(promote_into_freed_seat(&mut roster, 1, fixtures::epoch()).is_none());
    }
}
