//! Business metrics for the booking engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `gym_booking_bookings_total{status}` - Bookings by placement (booked, waitlisted)
//! - `gym_booking_cancellations_total{late}` - Cancellations, split by late flag
//! - `gym_booking_promotions_total` - Waitlist promotions
//! - `gym_booking_check_ins_total` - Check-ins
//! - `gym_booking_no_shows_total` - Records marked no-show
//! - `gym_booking_credit_mutations_total{kind}` - Credit ledger entries by kind
//! - `gym_booking_transaction_conflicts_total` - Optimistic commits that lost a race
//! - `gym_booking_store_commits_total{outcome}` - Store commits by outcome

use gymbook_core::AttendanceStatus;
use metrics::describe_counter;

/// Register all metric descriptions. Call once at startup.
pub fn register_business_metrics() {
    describe_counter!(
        "gym_booking_bookings_total",
        "Total number of bookings by placement (booked, waitlisted)"
    );
    describe_counter!(
        "gym_booking_cancellations_total",
        "Total number of cancellations, labelled by whether they were late"
    );
    describe_counter!(
        "gym_booking_promotions_total",
        "Total number of waitlist promotions"
    );
    describe_counter!("gym_booking_check_ins_total", "Total number of check-ins");
    describe_counter!(
        "gym_booking_no_shows_total",
        "Total number of bookings marked no-show"
    );
    describe_counter!(
        "gym_booking_credit_mutations_total",
        "Total number of credit balance changes by kind"
    );
    describe_counter!(
        "gym_booking_transaction_conflicts_total",
        "Total number of optimistic transaction conflicts"
    );
    describe_counter!(
        "gym_booking_store_commits_total",
        "Total number of store commits by outcome"
    );

    tracing::info!("Business metrics registered");
}

/// Record a committed booking.
pub fn record_booking(status: AttendanceStatus) {
    metrics::counter!("gym_booking_bookings_total", "status" => status.as_str()).increment(1);
}

/// Record a committed cancellation.
pub fn record_cancellation(late: bool) {
    let late = if late { "true" } else { "false" };
    metrics::counter!("gym_booking_cancellations_total", "late" => late).increment(1);
}

/// Record waitlist promotions.
pub fn record_promotions(count: usize) {
    if count > 0 {
        metrics::counter!("gym_booking_promotions_total").increment(count as u64);
    }
}

/// Record a check-in.
pub fn record_check_in() {
    metrics::counter!("gym_booking_check_ins_total").increment(1);
}

/// Record a no-show.
pub fn record_no_show() {
    metrics::counter!("gym_booking_no_shows_total").increment(1);
}
