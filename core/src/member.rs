//! Members, their per-gym memberships and credit balance.

use crate::ids::{GymId, MemberId, TierId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status shared by accounts and per-gym memberships.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Paying member in good standing
    Active,
    /// Trial period, treated like active for access
    Trialing,
    /// Latest invoice failed
    PastDue,
    /// Lead that has not converted
    Prospect,
    /// Former member
    Archived,
    /// Blocked by the gym
    Banned,
}

impl MembershipStatus {
    /// Whether this status grants plan-based class access.
    #[must_use]
    pub const fn grants_access(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// Lowercase wire name, also used in user-facing messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Prospect => "prospect",
            Self::Archived => "archived",
            Self::Banned => "banned",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member's subscription at one gym.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GymMembership {
    /// Gym this membership belongs to
    pub gym_id: GymId,
    /// Tier (plan) the member is on
    pub tier_id: TierId,
    /// Billing status of the membership
    pub status: MembershipStatus,
}

/// A gym member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member id
    pub id: MemberId,
    /// Name shown on rosters
    pub display_name: String,
    /// Avatar shown on rosters
    pub photo_url: Option<String>,
    /// Drop-in credit balance, never negative
    pub class_credits: i64,
    /// One entry per gym
    pub memberships: Vec<GymMembership>,
    /// Account-level status
    pub status: MembershipStatus,
    /// When the member was created
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Creates a prospect with no credits and no memberships.
    #[must_use]
    pub fn new(id: MemberId, display_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            photo_url: None,
            class_credits: 0,
            memberships: Vec::new(),
            status: MembershipStatus::Prospect,
            created_at,
        }
    }

    /// The member's membership at `gym_id`, if any.
    #[must_use]
    pub fn membership_for(&self, gym_id: &GymId) -> Option<&GymMembership> {
        self.memberships.iter().find(|m| &m.gym_id == gym_id)
    }

    /// Whether the account is banned.
    #[must_use]
    pub fn is_banned(&self) -> bool {
        self.status == MembershipStatus::Banned
    }

    /// Whether the balance covers `cost`.
    #[must_use]
    pub fn can_afford(&self, cost: u32) -> bool {
        self.class_credits >= i64::from(cost)
    }
}
