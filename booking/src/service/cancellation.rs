use super::{
    BookingService, CancelOptions, CancellationOutcome, load_class, load_gym, load_member,
    require_admin,
};
use crate::error::{BookingError, BookingResult};
use crate::ledger::{self, CreditChange};
use crate::{metrics, waitlist};
use chrono::{DateTime, Duration, Utc};
use gymbook_core::{
    AttendanceStatus, BookingType, LateCancelPolicy, MemberId, SessionKey, WeeklyUsage,
};
use gymbook_runtime::{Transaction, retry_on_conflict};

impl BookingService {
    /// Cancel `member_id`'s place in `session`.
    ///
    /// A cancellation is late when it happens less than the cancellation
    /// window before the session starts. Credit bookings are refunded unless
    /// the cancellation is late and the resolved policy forfeits the credit;
    /// waitlisted records are always refunded. A freed seat goes to the head
    /// of the waitlist.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`]: a policy override without an admin actor
    /// - [`BookingError::NotFound`]: unknown gym, class or member
    /// - [`BookingError::NotBooked`]: no live record for the member
    /// - [`BookingError::InvalidTransition`]: the record was marked no-show
    /// - [`BookingError::Store`]: storage failure or conflict retries exhausted
    pub async fn cancel_booking(
        &self,
        session: &SessionKey,
        member_id: &MemberId,
        options: CancelOptions,
    ) -> BookingResult<CancellationOutcome> {
        if options.late_cancel_policy.is_some() {
            require_admin(&options.actor, "override the late cancellation policy")?;
        }

        let env = &self.env;
        let options = &options;
        let outcome = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let gym = load_gym(&tx, session).await?;
            let class = load_class(&tx, session).await?;
            let mut roster = tx.roster(session).await?;

            let record = roster
                .records
                .get_mut(member_id)
                .filter(|r| r.status.is_live())
                .ok_or(BookingError::NotBooked)?;
            if record.status == AttendanceStatus::NoShow {
                return Err(BookingError::InvalidTransition {
                    from: record.status,
                    action: "cancel",
                });
            }

            let held_seat = record.status.is_active();
            let rules = env
                .defaults
                .resolve(&gym.booking_rules, class.booking_rules.as_ref());
            let late = held_seat
                && is_late(
                    class.starts_at(session.date, gym.timezone),
                    rules.cancellation_window_minutes,
                    now,
                );
            let policy = options.late_cancel_policy.unwrap_or(rules.late_cancel_policy);

            let refund_due = record.booking_type == BookingType::Credit
                && record.cost_used > 0
                && !record.refunded
                && (!late || policy == LateCancelPolicy::Refund);

            let mut refunded_credits = 0;
            if refund_due {
                let mut member = load_member(&mut tx, member_id).await?;
                ledger::post(
                    &mut tx,
                    &mut member,
                    CreditChange::refund(
                        record.cost_used,
                        &record.class_name,
                        &session.gym_id,
                        options.actor.clone(),
                    ),
                    now,
                )?;
                record.refunded = true;
                refunded_credits = record.cost_used;
            }

            record.status = AttendanceStatus::Cancelled;
            record.cancelled_at = Some(now);
            record.late_cancel = late;
            let cancelled = record.clone();

            let usage_key =
                WeeklyUsage::key_for(session.gym_id.clone(), member_id.clone(), session.date);
            let mut usage = tx.weekly_usage(&usage_key).await?;
            usage.decrement();
            tx.put_weekly_usage(usage);

            let promoted = if held_seat {
                waitlist::promote_into_freed_seat(&mut roster, class.effective_capacity(), now)
            } else {
                None
            };

            tx.put_roster(roster);
            ledger::commit(tx).await?;
            Ok::<_, BookingError>(CancellationOutcome {
                record: cancelled,
                refunded_credits,
                late_cancel: late,
                promoted,
            })
        })
        .await?;

        metrics::record_cancellation(outcome.late_cancel);
        metrics::record_promotions(usize::from(outcome.promoted.is_some()));
        tracing::info!(
            session = %session,
            member_id = %member_id,
            late = outcome.late_cancel,
            refunded = outcome.refunded_credits,
            promoted = ?outcome.promoted,
            actor = %options.actor,
            "Booking cancelled"
        );
        Ok(outcome)
    }
}

/// Whether cancelling at `now` falls inside the window before `starts_at`.
fn is_late(starts_at: DateTime<Utc>, window_minutes: u32, now: DateTime<Utc>) -> bool {
    now > starts_at - Duration::minutes(i64::from(window_minutes))
}
