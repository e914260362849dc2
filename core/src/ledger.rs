//! Credit log entries: the append-only audit trail of credit balance changes.

use crate::ids::{GymId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who caused a change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The booking engine acting on a member's own request
    System,
    /// A gym admin, by uid
    Admin(String),
}

impl Actor {
    /// Whether the actor is an admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::System
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Admin(uid) => f.write_str(uid),
        }
    }
}

/// Why a balance changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditLogKind {
    /// Credits spent on a booking
    Booking,
    /// Credits returned on cancellation
    Refund,
    /// Manual correction by an admin
    AdminAdjustment,
    /// Credits bought
    Purchase,
}

impl CreditLogKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Refund => "refund",
            Self::AdminAdjustment => "admin_adjustment",
            Self::Purchase => "purchase",
        }
    }
}

/// Unique identifier for a credit log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditLogId(Uuid);

impl CreditLogId {
    /// Creates a new random `CreditLogId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CreditLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CreditLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLogEntry {
    /// Entry id
    pub id: CreditLogId,
    /// Member whose balance changed
    pub member_id: MemberId,
    /// Gym the change relates to, if any
    pub gym_id: Option<GymId>,
    /// Signed change: negative debits, positive credits
    pub amount: i64,
    /// Reason category
    pub kind: CreditLogKind,
    /// Free-text description shown in the member's history
    pub description: String,
    /// Who made the change
    pub created_by: Actor,
    /// When the change was made
    pub created_at: DateTime<Utc>,
}
