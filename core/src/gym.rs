//! Gyms, their booking rules and membership tiers.

use crate::ids::{GymId, MemberId, TierId};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// What happens to the credit of a credit booking cancelled inside the
/// cancellation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateCancelPolicy {
    /// Return the credit anyway
    Refund,
    /// Keep the credit
    Forfeit,
}

/// Booking rules. Every field is optional so class rules can override gym
/// rules field by field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRules {
    /// Minutes before class start after which a cancellation is late
    pub cancellation_window_minutes: Option<u32>,
    /// Credit handling for late cancellations
    pub late_cancel_policy: Option<LateCancelPolicy>,
}

impl BookingRules {
    /// Layers `overrides` on top of `self`.
    #[must_use]
    pub fn overridden_by(&self, overrides: Option<&Self>) -> Self {
        let Some(overrides) = overrides else {
            return self.clone();
        };
        Self {
            cancellation_window_minutes: overrides
                .cancellation_window_minutes
                .or(self.cancellation_window_minutes),
            late_cancel_policy: overrides.late_cancel_policy.or(self.late_cancel_policy),
        }
    }
}

/// A tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gym {
    /// Gym id
    pub id: GymId,
    /// Display name
    pub name: String,
    /// Timezone class times are expressed in
    pub timezone: Tz,
    /// Gym-wide booking defaults
    #[serde(default)]
    pub booking_rules: BookingRules,
    /// Account that administers the gym
    #[serde(default)]
    pub owner_id: Option<MemberId>,
    /// Connected payment account, once onboarding started
    #[serde(default)]
    pub stripe_account_id: Option<String>,
}

/// A membership plan offered by a gym.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipTier {
    /// Tier id
    pub id: TierId,
    /// Owning gym
    pub gym_id: GymId,
    /// Display name
    pub name: String,
    /// Maximum bookings per ISO week; `None` or `0` means uncapped
    pub weekly_limit: Option<u32>,
}

impl MembershipTier {
    /// The weekly cap, if one is in force.
    #[must_use]
    pub fn effective_weekly_limit(&self) -> Option<u32> {
        self.weekly_limit.filter(|limit| *limit > 0)
    }
}
