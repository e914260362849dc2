//! Errors surfaced by booking operations.
//!
//! Messages are user-facing and returned verbatim in the API envelope.

use gymbook_core::{AttendanceStatus, StoreError};
use gymbook_runtime::Retryable;
use thiserror::Error;

/// Result alias for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;

/// Why a booking operation was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// A referenced document does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of document (`Gym`, `Class`, `Member`, ...)
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// The session cannot take bookings
    #[error("{0}")]
    SessionUnavailable(String),

    /// Eligibility denied the booking; carries the denial reason
    #[error("{0}")]
    NotEligible(String),

    /// The member already holds a live record for the session
    #[error("{}", already_booked_message(.status))]
    AlreadyBooked {
        /// Status of the existing record
        status: AttendanceStatus,
    },

    /// No live record to act on
    #[error("No active booking found for this session")]
    NotBooked,

    /// The record is in a state the operation does not accept
    #[error("Cannot {action}: booking is {from}")]
    InvalidTransition {
        /// Current status
        from: AttendanceStatus,
        /// Operation attempted
        action: &'static str,
    },

    /// A debit would take the balance below zero
    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits {
        /// Current balance
        balance: i64,
        /// Credits needed
        required: i64,
    },

    /// The caller may not perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Storage failed or the conflict retries ran out
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn already_booked_message(status: &AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Waitlisted => "Member is already on the waitlist for this session",
        _ => "Member is already booked for this session",
    }
}

impl BookingError {
    /// Shorthand for [`BookingError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl Retryable for BookingError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymbook_core::Version;

    #[test]
    fn duplicate_booking_messages_name_the_existing_state() {
        let booked = BookingError::AlreadyBooked {
            status: AttendanceStatus::Booked,
        };
        let waitlisted = BookingError::AlreadyBooked {
            status: AttendanceStatus::Waitlisted,
        };

        assert_eq!(booked.to_string(), "Member is already booked for this session");
        assert_eq!(
            waitlisted.to_string(),
            "Member is already on the waitlist for this session"
        );
    }

    #[test]
    fn only_store_conflicts_are_retried() {
        let conflict = BookingError::from(StoreError::Conflict {
            doc: "rosters/x".to_string(),
            expected: Version::new(1),
            actual: Version::new(2),
        });

        assert!(conflict.is_retryable());
        assert!(!BookingError::NotBooked.is_retryable());
        assert!(!BookingError::from(StoreError::Database("down".to_string())).is_retryable());
    }

    #[test]
    fn invalid_transition_message() {
        let err = BookingError::InvalidTransition {
            from: AttendanceStatus::Attended,
            action: "mark as no-show",
        };
        assert_eq!(err.to_string(), "Cannot mark as no-show: booking is attended");
    }
}
