//! Booking transaction orchestrator.
//!
//! Every mutating operation is one read-decide-write closure run through
//! [`retry_on_conflict`](gymbook_runtime::retry_on_conflict): documents are
//! read through a [`Transaction`], the rules in [`eligibility`](crate::eligibility),
//! [`waitlist`](crate::waitlist) and [`ledger`](crate::ledger) decide, and the
//! staged writes commit as one batch. A batch that loses a race is discarded
//! and the whole closure runs again on fresh data, so no partial write is ever
//! visible.

mod attendance;
mod booking;
mod cancellation;
mod catalog;
mod credits;

use crate::environment::BookingEnvironment;
use crate::error::{BookingError, BookingResult};
use gymbook_core::{
    Actor, AttendanceRecord, BookingType, ClassSeries, CreditLogEntry, Gym, LateCancelPolicy,
    Member, MemberId, NaiveDate, SessionKey,
};
use gymbook_runtime::Transaction;
use serde::{Deserialize, Serialize};

/// Options for [`BookingService::book_member`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookingOptions {
    /// Seat the member even if the session is full (admin only)
    pub force: bool,
    /// Use this access path instead of the resolved one (admin only)
    pub booking_type: Option<BookingType>,
    /// Do not debit credits for a credit booking (admin only)
    pub waive_cost: bool,
    /// Who is booking
    #[serde(skip)]
    pub actor: Actor,
}

impl BookingOptions {
    /// Options for a plain self-service booking.
    #[must_use]
    pub fn member() -> Self {
        Self::default()
    }

    /// Whether any admin-only option is set.
    #[must_use]
    pub const fn is_override(&self) -> bool {
        self.force || self.booking_type.is_some() || self.waive_cost
    }
}

/// Result of a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingOutcome {
    /// The written record (booked or waitlisted)
    pub record: AttendanceRecord,
    /// Member balance after the booking
    pub credits_remaining: i64,
}

/// Options for [`BookingService::cancel_booking`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CancelOptions {
    /// Override the resolved late cancellation policy (admin only)
    pub late_cancel_policy: Option<LateCancelPolicy>,
    /// Who is cancelling
    #[serde(skip)]
    pub actor: Actor,
}

/// Result of a cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CancellationOutcome {
    /// The cancelled record
    pub record: AttendanceRecord,
    /// Credits returned to the member
    pub refunded_credits: u32,
    /// Whether the cancellation fell inside the cancellation window
    pub late_cancel: bool,
    /// Member moved off the waitlist into the freed seat
    pub promoted: Option<MemberId>,
}

/// Result of marking a no-show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NoShowOutcome {
    /// The updated record
    pub record: AttendanceRecord,
    /// Member moved off the waitlist into the freed seat
    pub promoted: Option<MemberId>,
}

/// Result of a waitlist pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    /// Number of members promoted
    pub promoted: u32,
    /// Promoted members in promotion order
    pub members: Vec<MemberId>,
}

/// A balance change and the resulting balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreditMutation {
    /// The appended ledger entry
    pub entry: CreditLogEntry,
    /// Balance after the change
    pub balance: i64,
}

/// Everything on a session's roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RosterView {
    /// The session
    pub session: SessionKey,
    /// Effective seat limit
    pub capacity: u32,
    /// Records holding a seat
    pub active: u32,
    /// Records on the waitlist
    pub waitlisted: u32,
    /// Active records, then the waitlist in promotion order, then the rest
    pub records: Vec<AttendanceRecord>,
}

/// The booking engine.
#[derive(Clone, Debug)]
pub struct BookingService {
    env: BookingEnvironment,
}

impl BookingService {
    /// Create a service over `env`.
    #[must_use]
    pub const fn new(env: BookingEnvironment) -> Self {
        Self { env }
    }

    /// The injected environment.
    #[must_use]
    pub const fn environment(&self) -> &BookingEnvironment {
        &self.env
    }
}

async fn load_gym(tx: &Transaction<'_>, session: &SessionKey) -> BookingResult<Gym> {
    tx.gym(&session.gym_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Gym", &session.gym_id))
}

async fn load_class(tx: &Transaction<'_>, session: &SessionKey) -> BookingResult<ClassSeries> {
    tx.class(&session.gym_id, &session.class_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Class", &session.class_id))
}

async fn load_member(tx: &mut Transaction<'_>, member_id: &MemberId) -> BookingResult<Member> {
    tx.member(member_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Member", member_id))
}

/// Reject sessions that cannot take new bookings.
fn ensure_bookable(class: &ClassSeries, date: NaiveDate) -> BookingResult<()> {
    if class.archived {
        return Err(BookingError::SessionUnavailable(format!(
            "{} is no longer offered",
            class.name
        )));
    }
    if class.cancelled_dates.contains(&date) {
        return Err(BookingError::SessionUnavailable(format!(
            "{} on {date} has been cancelled",
            class.name
        )));
    }
    if !class.occurs_on(date) {
        return Err(BookingError::SessionUnavailable(format!(
            "{} is not scheduled on {date}",
            class.name
        )));
    }
    Ok(())
}

fn require_admin(actor: &Actor, what: &str) -> BookingResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!("Only gym admins may {what}")))
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
