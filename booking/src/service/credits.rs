use super::{BookingService, CreditMutation, load_member, require_admin};
use crate::error::{BookingError, BookingResult};
use crate::ledger::{self, CreditChange};
use gymbook_core::{Actor, CreditLogEntry, CreditLogKind, MemberId};
use gymbook_runtime::{Transaction, retry_on_conflict};

impl BookingService {
    /// Manually add (positive) or remove (negative) credits.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Forbidden`]: the actor is not an admin
    /// - [`BookingError::Validation`]: zero amount or empty description
    /// - [`BookingError::NotFound`]: unknown member
    /// - [`BookingError::InsufficientCredits`]: the balance would go negative
    pub async fn adjust_credits(
        &self,
        member_id: &MemberId,
        amount: i64,
        description: &str,
        actor: Actor,
    ) -> BookingResult<CreditMutation> {
        require_admin(&actor, "adjust credits")?;
        let description = description.trim();
        if description.is_empty() {
            return Err(BookingError::Validation(
                "A description is required for credit adjustments".to_string(),
            ));
        }

        let change = CreditChange {
            amount,
            kind: CreditLogKind::AdminAdjustment,
            description: description.to_string(),
            actor,
            gym_id: None,
        };
        self.mutate_credits(member_id, change).await
    }

    /// Add credits bought by the member.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`]: zero amount
    /// - [`BookingError::NotFound`]: unknown member
    pub async fn add_purchased_credits(
        &self,
        member_id: &MemberId,
        amount: u32,
        description: &str,
    ) -> BookingResult<CreditMutation> {
        let change = CreditChange {
            amount: i64::from(amount),
            kind: CreditLogKind::Purchase,
            description: description.to_string(),
            actor: Actor::System,
            gym_id: None,
        };
        self.mutate_credits(member_id, change).await
    }

    /// Ledger entries of a member, newest first.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`]: unknown member
    /// - [`BookingError::Store`]: storage failure
    pub async fn credit_history(&self, member_id: &MemberId) -> BookingResult<Vec<CreditLogEntry>> {
        let store = self.env.store.as_ref();
        if store.member(member_id).await?.is_none() {
            return Err(BookingError::not_found("Member", member_id));
        }
        Ok(store.credit_log(member_id).await?)
    }

    async fn mutate_credits(
        &self,
        member_id: &MemberId,
        change: CreditChange,
    ) -> BookingResult<CreditMutation> {
        let env = &self.env;
        let change = &change;
        let mutation = retry_on_conflict(&env.retry, || async move {
            let now = env.clock.now();
            let mut tx = Transaction::begin(env.store.as_ref());

            let mut member = load_member(&mut tx, member_id).await?;
            let entry = ledger::post(&mut tx, &mut member, change.clone(), now)?;

            ledger::commit(tx).await?;
            Ok::<_, BookingError>(CreditMutation {
                entry,
                balance: member.class_credits,
            })
        })
        .await?;

        tracing::info!(
            member_id = %member_id,
            amount = mutation.entry.amount,
            kind = mutation.entry.kind.as_str(),
            balance = mutation.balance,
            actor = %mutation.entry.created_by,
            "Credits changed"
        );
        Ok(mutation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::environment::BookingEnvironment;
    use crate::error::BookingError;
    use crate::service::BookingService;
    use gymbook_core::{Actor, CreditLogKind, MemberId};
    use gymbook_testing::{InMemoryBookingStore, fixtures, test_clock};
    use std::sync::Arc;

    fn service(store: &InMemoryBookingStore) -> BookingService {
        let env = BookingEnvironment::new(Arc::new(store.clone()), &Default::default())
            .with_clock(Arc::new(test_clock()));
        BookingService::new(env)
    }

    #[tokio::test]
    async fn adjustment_writes_balance_and_log() {
        let store = InMemoryBookingStore::new();
        store.seed_member(fixtures::member("alice", 2));
        let service = service(&store);
        let alice = MemberId::new("alice");

        let mutation = service
            .adjust_credits(&alice, 5, "Goodwill", Actor::Admin("owner".to_string()))
            .await
            .unwrap();

        assert_eq!(mutation.balance, 7);
        assert_eq!(mutation.entry.amount, 5);
        assert_eq!(mutation.entry.kind, CreditLogKind::AdminAdjustment);

        let history = service.credit_history(&alice).await.unwrap();
        assert_eq!(history, vec![mutation.entry]);
    }

    #[tokio::test]
    async fn adjustment_requires_admin() {
        let store = InMemoryBookingStore::new();
        store.seed_member(fixtures::member("alice", 2));

        let err = service(&store)
            .adjust_credits(&MemberId::new("alice"), 5, "Goodwill", Actor::System)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Forbidden(_)));
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn adjustment_cannot_overdraw() {
        let store = InMemoryBookingStore::new();
        store.seed_member(fixtures::member("alice", 2));

        let err = service(&store)
            .adjust_credits(
                &MemberId::new("alice"),
                -3,
                "Correction",
                Actor::Admin("owner".to_string()),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BookingError::InsufficientCredits {
                balance: 2,
                required: 3
            }
        );
        assert!(store.all_credit_logs().is_empty());
    }

    #[tokio::test]
    async fn empty_description_is_rejected() {
        let store = InMemoryBookingStore::new();
        store.seed_member(fixtures::member("alice", 2));

        let err = service(&store)
            .adjust_credits(&MemberId::new("alice"), 1, "  ", Actor::Admin("owner".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn history_of_unknown_member_is_not_found() {
        let store = InMemoryBookingStore::new();

        let err = service(&store)
            .credit_history(&MemberId::new("ghost"))
            .await
            .unwrap_err();

        assert_eq!(err, BookingError::not_found("Member", "ghost"));
    }
}
