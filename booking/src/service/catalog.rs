use super::{BookingService, RosterView, count, load_class, load_member};
use crate::error::{BookingError, BookingResult};
use gymbook_core::{
    AttendanceRecord, AttendanceStatus, ClassSeries, Gym, GymMembership, Member, MemberId,
    MembershipTier, SessionKey,
};
use gymbook_runtime::{Transaction, retry_on_conflict};
use std::cmp::Ordering;

impl BookingService {
    /// Create or replace a gym.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the write fails.
    pub async fn put_gym(&self, gym: Gym) -> BookingResult<()> {
        tracing::debug!(gym_id = %gym.id, "Saving gym");
        Ok(self.env.store.put_gym(gym).await?)
    }

    /// Create or replace a class series.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`]: the class has no name
    /// - [`BookingError::Store`]: the write failed
    pub async fn put_class(&self, class: ClassSeries) -> BookingResult<()> {
        if class.name.trim().is_empty() {
            return Err(BookingError::Validation("Class name is required".to_string()));
        }
        tracing::debug!(gym_id = %class.gym_id, class_id = %class.id, "Saving class");
        Ok(self.env.store.put_class(class).await?)
    }

    /// Create or replace a membership tier.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] if the write fails.
    pub async fn put_tier(&self, tier: MembershipTier) -> BookingResult<()> {
        tracing::debug!(gym_id = %tier.gym_id, tier_id = %tier.id, "Saving tier");
        Ok(self.env.store.put_tier(tier).await?)
    }

    /// Register a new member.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`]: the member already exists or has a negative balance
    /// - [`BookingError::Store`]: storage failure
    pub async fn register_member(&self, member: Member) -> BookingResult<Member> {
        if member.class_credits < 0 {
            return Err(BookingError::Validation(
                "Credit balance cannot be negative".to_string(),
            ));
        }

        let env = &self.env;
        let member = &member;
        retry_on_conflict(&env.retry, || async move {
            let mut tx = Transaction::begin(env.store.as_ref());
            if tx.member(&member.id).await?.is_some() {
                return Err(BookingError::Validation(format!(
                    "Member already exists: {}",
                    member.id
                )));
            }
            tx.put_member(member.clone());
            tx.commit().await?;
            Ok::<_, BookingError>(())
        })
        .await?;

        tracing::info!(member_id = %member.id, "Member registered");
        Ok(member.clone())
    }

    /// Set the member's membership at `membership.gym_id`, replacing any
    /// previous one at that gym.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown member
    /// - [`BookingError::Store`]: storage failure
    pub async fn set_membership(
        &self,
        member_id: &MemberId,
        membership: GymMembership,
    ) -> BookingResult<Member> {
        let env = &self.env;
        let membership = &membership;
        let member = retry_on_conflict(&env.retry, || async move {
            let mut tx = Transaction::begin(env.store.as_ref());
            let mut member = load_member(&mut tx, member_id).await?;

            member.memberships.retain(|m| m.gym_id != membership.gym_id);
            member.memberships.push(membership.clone());

            tx.put_member(member.clone());
            tx.commit().await?;
            Ok::<_, BookingError>(member)
        })
        .await?;

        tracing::info!(
            member_id = %member_id,
            gym_id = %membership.gym_id,
            tier_id = %membership.tier_id,
            status = %membership.status,
            "Membership updated"
        );
        Ok(member)
    }

    /// Everyone on a session: seated records by booking time, then the
    /// waitlist in promotion order, then no-shows and cancellations.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown class
    /// - [`BookingError::Store`]: storage failure
    pub async fn session_roster(&self, session: &SessionKey) -> BookingResult<RosterView> {
        let mut tx = Transaction::begin(self.env.store.as_ref());
        let class = load_class(&tx, session).await?;
        let roster = tx.roster(session).await?;

        let mut records: Vec<AttendanceRecord> = roster.records.values().cloned().collect();
        records.sort_by(roster_order);

        Ok(RosterView {
            session: session.clone(),
            capacity: class.effective_capacity(),
            active: roster.active_count(),
            waitlisted: count(roster.waitlist_len()),
            records,
        })
    }
}

fn roster_rank(status: AttendanceStatus) -> u8 {
    match status {
        AttendanceStatus::Booked | AttendanceStatus::Attended => 0,
        AttendanceStatus::Waitlisted => 1,
        AttendanceStatus::NoShow => 2,
        AttendanceStatus::Cancelled => 3,
    }
}

fn roster_order(a: &AttendanceRecord, b: &AttendanceRecord) -> Ordering {
    roster_rank(a.status)
        .cmp(&roster_rank(b.status))
        .then_with(|| a.booked_at.cmp(&b.booked_at))
        .then_with(|| a.member_id.cmp(&b.member_id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::environment::BookingEnvironment;
    use gymbook_core::MembershipStatus;
    use gymbook_testing::{InMemoryBookingStore, fixtures, test_clock};
    use std::sync::Arc;

    fn service(store: &InMemoryBookingStore) -> BookingService {
        let env = BookingEnvironment::new(Arc::new(store.clone()), &Default::default())
            .with_clock(Arc::new(test_clock()));
        BookingService::new(env)
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let store = InMemoryBookingStore::new();
        let service = service(&store);

        service
            .register_member(fixtures::member("alice", 0))
            .await
            .unwrap();
        let err = service
            .register_member(fixtures::member("alice", 5))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BookingError::Validation("Member already exists: alice".to_string())
        );
    }

    #[tokio::test]
    async fn membership_is_replaced_per_gym() {
        let store = InMemoryBookingStore::new();
        store.seed_member(fixtures::member_with_plan(
            "alice",
            "basic",
            MembershipStatus::PastDue,
        ));
        let service = service(&store);

        let member = service
            .set_membership(
                &MemberId::new("alice"),
                GymMembership {
                    gym_id: fixtures::gym_id(),
                    tier_id: "premium".into(),
                    status: MembershipStatus::Active,
                },
            )
            .await
            .unwrap();

        assert_eq!(member.memberships.len(), 1);
        assert_eq!(member.memberships[0].tier_id.as_str(), "premium");
        assert_eq!(member.memberships[0].status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn roster_of_unknown_class_is_not_found() {
        let store = InMemoryBookingStore::new();

        let err = service(&store)
            .session_roster(&fixtures::session())
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::NotFound { kind: "Class", .. }));
    }

    #[test]
    fn seated_records_sort_before_the_waitlist() {
        assert!(roster_rank(AttendanceStatus::Attended) < roster_rank(AttendanceStatus::Waitlisted));
        assert!(roster_rank(AttendanceStatus::Waitlisted) < roster_rank(AttendanceStatus::NoShow));
        assert!(roster_rank(AttendanceStatus::NoShow) < roster_rank(AttendanceStatus::Cancelled));
    }
}
