//! Credit ledger: every balance change is staged together with exactly one
//! [`CreditLogEntry`] carrying the same signed amount.

use crate::error::{BookingError, BookingResult};
use chrono::{DateTime, Utc};
use gymbook_core::{Actor, CreditLogEntry, CreditLogId, CreditLogKind, GymId, Member};
use gymbook_runtime::Transaction;

/// A requested balance change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreditChange {
    /// Signed amount: negative debits, positive credits
    pub amount: i64,
    /// Reason category
    pub kind: CreditLogKind,
    /// Shown in the member's history
    pub description: String,
    /// Who asked for the change
    pub actor: Actor,
    /// Gym the change relates to
    pub gym_id: Option<GymId>,
}

impl CreditChange {
    /// Debit for a booking.
    #[must_use]
    pub fn booking(cost: u32, class_name: &str, gym_id: &GymId, actor: Actor) -> Self {
        Self {
            amount: -i64::from(cost),
            kind: CreditLogKind::Booking,
            description: format!("Booked {class_name}"),
            actor,
            gym_id: Some(gym_id.clone()),
        }
    }

    /// Credit returned on cancellation.
    #[must_use]
    pub fn refund(cost: u32, class_name: &str, gym_id: &GymId, actor: Actor) -> Self {
        Self {
            amount: i64::from(cost),
            kind: CreditLogKind::Refund,
            description: format!("Refund: cancelled {class_name}"),
            actor,
            gym_id: Some(gym_id.clone()),
        }
    }
}

/// Apply `change` to `member` and build its log entry.
///
/// # Errors
///
/// - [`BookingError::Validation`]: the amount is zero
/// - [`BookingError::InsufficientCredits`]: the balance would go negative
pub fn apply(
    member: &mut Member,
    change: CreditChange,
    now: DateTime<Utc>,
) -> BookingResult<CreditLogEntry> {
    if change.amount == 0 {
        return Err(BookingError::Validation(
            "Credit change must not be zero".to_string(),
        ));
    }

    let balance = member
        .class_credits
        .checked_add(change.amount)
        .ok_or_else(|| BookingError::Validation("Credit balance overflow".to_string()))?;
    if balance < 0 {
        return Err(BookingError::InsufficientCredits {
            balance: member.class_credits,
            required: change.amount.saturating_neg(),
        });
    }
    member.class_credits = balance;

    Ok(CreditLogEntry {
        id: CreditLogId::new(),
        member_id: member.id.clone(),
        gym_id: change.gym_id,
        amount: change.amount,
        kind: change.kind,
        description: change.description,
        created_by: change.actor,
        created_at: now,
    })
}

/// Apply `change` and stage both the member write and the log entry in `tx`.
///
/// # Errors
///
/// See [`apply`]. Nothing is staged on error.
pub fn post(
    tx: &mut Transaction<'_>,
    member: &mut Member,
    change: CreditChange,
    now: DateTime<Utc>,
) -> BookingResult<CreditLogEntry> {
    let entry = apply(member, change, now)?;

    tracing::debug!(
        member_id = %entry.member_id,
        amount = entry.amount,
        kind = entry.kind.as_str(),
        balance = member.class_credits,
        "Credit mutation staged"
    );

    tx.put_member(member.clone());
    tx.append_credit_log(entry.clone());
    Ok(entry)
}

/// Commit `tx`, counting its credit log entries only once they are durable.
///
/// Returns the number of entries committed.
///
/// # Errors
///
/// [`BookingError::Store`] when the commit fails. Nothing is counted then.
pub async fn commit(tx: Transaction<'_>) -> BookingResult<usize> {
    let kinds: Vec<CreditLogKind> = tx.staged_credit_log().map(|entry| entry.kind).collect();
    tx.commit().await?;
    for kind in &kinds {
        metrics::counter!("gym_booking_credit_mutations_total", "kind" => kind.as_str())
            .increment(1);
    }
    Ok(kinds.len())
}
