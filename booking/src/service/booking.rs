use super::{
    BookingOptions, BookingOutcome, BookingService, ensure_bookable, load_class, load_member,
    require_admin,
};
use crate::eligibility::{Eligibility, EligibilityInput, can_user_book};
use crate::error::{BookingError, BookingResult};
use crate::ledger::{self, CreditChange};
use crate::{metrics, waitlist};
use chrono::{DateTime, Utc};
use gymbook_core::{
    AttendanceRecord, BookingType, ClassSeries, Member, MemberId, SessionKey, SessionRoster,
    WeeklyUsage,
};
use gymbook_runtime::{Transaction, retry_on_conflict};

impl BookingService {
    /// Book `member_id` into `session`.
    ///
    /// Re-runs eligibility, rejects a second live record for the member,
    /// debits credits for credit bookings, and seats the member or queues them
    /// on the waitlist, all in one transaction.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`]: override options without an admin actor
    /// - [`BookingError::NotFound`]: unknown class or member
    /// - [`BookingError::SessionUnavailable`]: archived, unscheduled or cancelled session
    /// - [`BookingError::AlreadyBooked`]: the member already holds a live record
    /// - [`BookingError::NotEligible`]: eligibility denied the booking
    /// - [`BookingError::InsufficientCredits`]: a credit override without the balance
    /// - [`BookingError::Store`]: storage failure or conflict retries exhausted
    pub async fn book_member(
        &self,
        session: &SessionKey,
        member_id: &MemberId,
        options: BookingOptions,
    ) -> BookingResult<BookingOutcome> {
        if options.is_override() {
            require_admin(&options.actor, "force, override or waive a booking")?;
        }

        let env = &self.env;
        let options = &options;
        let outcome = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let class = load_class(&tx, session).await?;
            ensure_bookable(&class, session.date)?;
            let mut member = load_member(&mut tx, member_id).await?;
            let mut roster = tx.roster(session).await?;

            let record =
                reserve_seat(&mut tx, &class, &mut member, &mut roster, options, now).await?;

            tx.put_roster(roster);
            ledger::commit(tx).await?;
            Ok::<_, BookingError>(BookingOutcome {
                record,
                credits_remaining: member.class_credits,
            })
        })
        .await?;

        metrics::record_booking(outcome.record.status);
        tracing::info!(
            session = %session,
            member_id = %member_id,
            status = %outcome.record.status,
            booking_type = %outcome.record.booking_type,
            cost = outcome.record.cost_used,
            actor = %options.actor,
            "Member booked"
        );
        Ok(outcome)
    }

    /// Pre-flight eligibility check. Reads only; nothing is written.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown class or member
    /// - [`BookingError::SessionUnavailable`]: the session takes no bookings
    /// - [`BookingError::Store`]: storage failure
    pub async fn check_eligibility(
        &self,
        session: &SessionKey,
        member_id: &MemberId,
    ) -> BookingResult<Eligibility> {
        let mut tx = Transaction::begin(self.env.store.as_ref());
        let class = load_class(&tx, session).await?;
        ensure_bookable(&class, session.date)?;
        let member = load_member(&mut tx, member_id).await?;
        let usage = tx
            .weekly_usage(&WeeklyUsage::key_for(
                session.gym_id.clone(),
                member_id.clone(),
                session.date,
            ))
            .await?;
        let tier = match member.membership_for(&session.gym_id) {
            Some(membership) => tx.tier(&session.gym_id, &membership.tier_id).await?,
            None => None,
        };

        Ok(can_user_book(&EligibilityInput {
            class: &class,
            member: &member,
            gym_id: &session.gym_id,
            tier: tier.as_ref(),
            weekly_bookings: usage.bookings,
        }))
    }
}

/// Write a new booking for `member` into `roster`.
///
/// Stages the weekly usage bump and, for charged credit bookings, the debit
/// and its ledger entry. The caller stages the roster.
pub(super) async fn reserve_seat(
    tx: &mut Transaction<'_>,
    class: &ClassSeries,
    member: &mut Member,
    roster: &mut SessionRoster,
    options: &BookingOptions,
    now: DateTime<Utc>,
) -> BookingResult<AttendanceRecord> {
    let session = roster.session.clone();

    if let Some(existing) = roster.record(&member.id).filter(|r| r.status.is_live()) {
        return Err(BookingError::AlreadyBooked {
            status: existing.status,
        });
    }

    let usage_key = WeeklyUsage::key_for(session.gym_id.clone(), member.id.clone(), session.date);
    let mut usage = tx.weekly_usage(&usage_key).await?;
    let tier = match member.membership_for(&session.gym_id) {
        Some(membership) => tx.tier(&session.gym_id, &membership.tier_id).await?,
        None => None,
    };

    let eligibility = can_user_book(&EligibilityInput {
        class,
        member: &*member,
        gym_id: &session.gym_id,
        tier: tier.as_ref(),
        weekly_bookings: usage.bookings,
    });
    let (booking_type, cost) = resolve_access(&eligibility, options, class)?;

    let charge = if booking_type == BookingType::Credit && !options.waive_cost {
        cost
    } else {
        0
    };
    if charge > 0 {
        ledger::post(
            tx,
            member,
            CreditChange::booking(charge, &class.name, &session.gym_id, options.actor.clone()),
            now,
        )?;
    }

    let placement = waitlist::place(roster, class.effective_capacity(), options.force);
    let record = AttendanceRecord {
        id: session.attendance_id(&member.id),
        session,
        member_id: member.id.clone(),
        status: placement.status(),
        booking_type,
        cost_used: charge,
        booked_at: now,
        cancelled_at: None,
        promoted_at: None,
        checked_in_at: None,
        refunded: false,
        late_cancel: false,
        member_name: member.display_name.clone(),
        member_photo: member.photo_url.clone(),
        class_name: class.name.clone(),
        class_time: class.time,
    };
    roster.records.insert(member.id.clone(), record.clone());

    usage.increment();
    tx.put_weekly_usage(usage);

    Ok(record)
}

/// Access path and cost: an admin override wins, otherwise eligibility decides.
fn resolve_access(
    eligibility: &Eligibility,
    options: &BookingOptions,
    class: &ClassSeries,
) -> BookingResult<(BookingType, u32)> {
    match (options.booking_type, eligibility) {
        (Some(BookingType::Credit), _) => Ok((BookingType::Credit, class.credit_cost)),
        (Some(other), _) => Ok((other, 0)),
        (
            None,
            Eligibility::Granted {
                booking_type, cost, ..
            },
        ) => Ok((*booking_type, *cost)),
        (None, Eligibility::Denied { reason }) => Err(BookingError::NotEligible(reason.to_string())),
    }
}
