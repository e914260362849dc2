use super::booking::reserve_seat;
use super::{
    BookingOptions, BookingService, NoShowOutcome, PromotionReport, count, ensure_bookable,
    load_class, load_member,
};
use crate::error::{BookingError, BookingResult};
use crate::{ledger, metrics, waitlist};
use gymbook_core::{Actor, AttendanceRecord, AttendanceStatus, MemberId, SessionKey};
use gymbook_runtime::{Transaction, retry_on_conflict};

impl BookingService {
    /// Mark `member_id` as attended.
    ///
    /// Booked and no-show records are checked in directly. A waitlisted
    /// record is promoted straight to attended, ignoring capacity. A member
    /// with no live record is first booked with `force` (eligibility and
    /// credit debit still apply).
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown class or member
    /// - [`BookingError::InvalidTransition`]: the member is already checked in
    /// - any error of [`BookingService::book_member`] for walk-ins
    pub async fn check_in_member(
        &self,
        session: &SessionKey,
        member_id: &MemberId,
        actor: Actor,
    ) -> BookingResult<AttendanceRecord> {
        let env = &self.env;
        let actor = &actor;
        let record = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let class = load_class(&tx, session).await?;
            let mut roster = tx.roster(session).await?;

            match roster.record(member_id).map(|r| r.status) {
                Some(AttendanceStatus::Attended) => {
                    return Err(BookingError::InvalidTransition {
                        from: AttendanceStatus::Attended,
                        action: "check in",
                    });
                }
                Some(AttendanceStatus::Booked | AttendanceStatus::NoShow) => {}
                Some(AttendanceStatus::Waitlisted) => {
                    if let Some(record) = roster.records.get_mut(member_id) {
                        record.promoted_at = Some(now);
                    }
                }
                None | Some(AttendanceStatus::Cancelled) => {
                    ensure_bookable(&class, session.date)?;
                    let mut member = load_member(&mut tx, member_id).await?;
                    let walk_in = BookingOptions {
                        force: true,
                        actor: actor.clone(),
                        ..BookingOptions::default()
                    };
                    reserve_seat(&mut tx, &class, &mut member, &mut roster, &walk_in, now).await?;
                }
            }

            let record = roster
                .records
                .get_mut(member_id)
                .ok_or(BookingError::NotBooked)?;
            record.status = AttendanceStatus::Attended;
            record.checked_in_at = Some(now);
            let checked_in = record.clone();

            tx.put_roster(roster);
            ledger::commit(tx).await?;
            Ok::<_, BookingError>(checked_in)
        })
        .await?;

        metrics::record_check_in();
        tracing::info!(
            session = %session,
            member_id = %member_id,
            booking_type = %record.booking_type,
            actor = %actor,
            "Member checked in"
        );
        Ok(record)
    }

    /// Mark a booked member as a no-show. Frees the seat for the waitlist;
    /// credits are not returned.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown class
    /// - [`BookingError::NotBooked`]: no live record for the member
    /// - [`BookingError::InvalidTransition`]: the record is not booked
    pub async fn mark_no_show(
        &self,
        session: &SessionKey,
        member_id: &MemberId,
    ) -> BookingResult<NoShowOutcome> {
        let env = &self.env;
        let outcome = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let class = load_class(&tx, session).await?;
            let mut roster = tx.roster(session).await?;

            let record = roster
                .records
                .get_mut(member_id)
                .filter(|r| r.status.is_live())
                .ok_or(BookingError::NotBooked)?;
            if record.status != AttendanceStatus::Booked {
                return Err(BookingError::InvalidTransition {
                    from: record.status,
                    action: "mark as no-show",
                });
            }
            record.status = AttendanceStatus::NoShow;
            let marked = record.clone();

            let promoted =
                waitlist::promote_into_freed_seat(&mut roster, class.effective_capacity(), now);

            tx.put_roster(roster);
            ledger::commit(tx).await?;
            Ok::<_, BookingError>(NoShowOutcome {
                record: marked,
                promoted,
            })
        })
        .await?;

        metrics::record_no_show();
        metrics::record_promotions(usize::from(outcome.promoted.is_some()));
        tracing::info!(
            session = %session,
            member_id = %member_id,
            promoted = ?outcome.promoted,
            "Member marked no-show"
        );
        Ok(outcome)
    }

    /// Promote waitlisted members, FIFO, into every free seat.
    ///
    /// Promotion never charges: members paid (or were covered) when they
    /// joined the waitlist. Running it on a full session promotes nobody and
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown class
    /// - [`BookingError::Store`]: storage failure or conflict retries exhausted
    pub async fn process_waitlist(&self, session: &SessionKey) -> BookingResult<PromotionReport> {
        let env = &self.env;
        let members = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let class = load_class(&tx, session).await?;
            let mut roster = tx.roster(session).await?;

            let promoted = waitlist::fill_open_seats(&mut roster, class.effective_capacity(), now);
            if promoted.is_empty() {
                return Ok(promoted);
            }

            tx.put_roster(roster);
            ledger::commit(tx).await?;
            Ok::<_, BookingError>(promoted)
        })
        .await?;

        metrics::record_promotions(members.len());
        tracing::info!(
            session = %session,
            promoted = members.len(),
            "Waitlist processed"
        );
        Ok(PromotionReport {
            promoted: count(members.len()),
            members,
        })
    }
}
