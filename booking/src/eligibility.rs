//! Eligibility resolver: may this member book this class, and how?
//!
//! Pure function of the class, the member, the member's tier at the gym and
//! how many bookings the member already holds in the session's week. Used as
//! a pre-flight check and re-run inside every booking transaction.
//!
//! Resolution order:
//!
//! 1. A membership at the gym whose tier the class accepts, in `active` or
//!    `trialing` status, books for free unless the tier's weekly limit is
//!    reached.
//! 2. Otherwise (or when the weekly limit is reached) the member pays with
//!    credits if the class costs credits and the balance covers it, or books
//!    as a drop-in if the class is free and open to drop-ins. Banned accounts
//!    cannot take this path.
//! 3. Otherwise the booking is denied with the most specific reason: the
//!    membership status on an accepted plan, then a banned account, then
//!    missing credits, then a missing membership.
//!
//! A class that costs nothing is never paid for with credits. It is open to
//! members without an accepted plan only when drop-ins are enabled.

use gymbook_core::{BookingType, ClassSeries, GymId, Member, MembershipStatus, MembershipTier};
use serde::Serialize;
use std::fmt;

/// Facts the resolver decides on.
#[derive(Clone, Copy, Debug)]
pub struct EligibilityInput<'a> {
    /// Class being booked
    pub class: &'a ClassSeries,
    /// Member booking
    pub member: &'a Member,
    /// Gym the class belongs to
    pub gym_id: &'a GymId,
    /// The member's tier at that gym, if they hold one
    pub tier: Option<&'a MembershipTier>,
    /// Live bookings the member already holds in the session's week
    pub weekly_bookings: u32,
}

/// Why a booking is refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Denial {
    /// Right plan, but the membership is not in good standing
    MembershipInactive {
        /// Current membership status
        status: MembershipStatus,
    },
    /// Class costs credits the member does not have
    InsufficientCredits {
        /// Current balance
        balance: i64,
        /// Credits the class costs
        required: u32,
    },
    /// No plan covers the class and it is not open to drop-ins
    MembershipRequired,
    /// The account is banned
    AccountSuspended,
    /// The weekly cap is used up and no other access path applies
    WeeklyLimitReached {
        /// Bookings already held this week
        used: u32,
        /// Tier limit
        limit: u32,
    },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MembershipInactive { status } => {
                write!(f, "Membership is {status}, not active")
            }
            Self::InsufficientCredits { balance, required } => write!(
                f,
                "Insufficient credits: class costs {required}, balance is {balance}"
            ),
            Self::MembershipRequired => f.write_str("A membership is required to book this class"),
            Self::AccountSuspended => f.write_str("Account suspended"),
            Self::WeeklyLimitReached { used, limit } => {
                write!(f, "Weekly limit reached ({used}/{limit} classes this week)")
            }
        }
    }
}

/// Outcome of the resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Eligibility {
    /// The member may book
    Granted {
        /// Access path
        booking_type: BookingType,
        /// Credits the booking costs
        cost: u32,
        /// Membership access was replaced because the weekly limit was hit
        downgraded: bool,
    },
    /// The member may not book
    Denied {
        /// Reason shown to the member
        reason: Denial,
    },
}

impl Eligibility {
    const fn granted(booking_type: BookingType, cost: u32) -> Self {
        Self::Granted {
            booking_type,
            cost,
            downgraded: false,
        }
    }

    const fn denied(reason: Denial) -> Self {
        Self::Denied { reason }
    }

    /// Whether the member may book.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Access path, if granted.
    #[must_use]
    pub const fn booking_type(&self) -> Option<BookingType> {
        match self {
            Self::Granted { booking_type, .. } => Some(*booking_type),
            Self::Denied { .. } => None,
        }
    }
}

/// Decide whether and how the member may book the class.
#[must_use]
pub fn can_user_book(input: &EligibilityInput<'_>) -> Eligibility {
    let class = input.class;
    let membership = input.member.membership_for(input.gym_id);
    let on_allowed_plan = membership.filter(|m| class.allows_tier(&m.tier_id));

    if on_allowed_plan.is_some_and(|plan| plan.status.grants_access()) {
        let limit = input
            .tier
            .and_then(MembershipTier::effective_weekly_limit);
        return match limit {
            Some(limit) if input.weekly_bookings >= limit => {
                downgrade(input, input.weekly_bookings, limit)
            }
            _ => Eligibility::granted(BookingType::Membership, 0),
        };
    }

    if let Some(access) = pay_as_you_go(input) {
        return access;
    }

    let reason = if let Some(plan) = on_allowed_plan {
        Denial::MembershipInactive {
            status: plan.status,
        }
    } else if input.member.is_banned() {
        Denial::AccountSuspended
    } else if class.credit_cost > 0 {
        Denial::InsufficientCredits {
            balance: input.member.class_credits,
            required: class.credit_cost,
        }
    } else {
        Denial::MembershipRequired
    };
    Eligibility::denied(reason)
}

/// Credit or drop-in access, if either applies.
fn pay_as_you_go(input: &EligibilityInput<'_>) -> Option<Eligibility> {
    if input.member.is_banned() {
        return None;
    }
    let class = input.class;
    if class.credit_cost > 0 && input.member.can_afford(class.credit_cost) {
        return Some(Eligibility::granted(BookingType::Credit, class.credit_cost));
    }
    if class.credit_cost == 0 && class.drop_in_enabled {
        return Some(Eligibility::granted(BookingType::DropIn, 0));
    }
    None
}

fn downgrade(input: &EligibilityInput<'_>, used: u32, limit: u32) -> Eligibility {
    match pay_as_you_go(input) {
        Some(Eligibility::Granted {
            booking_type, cost, ..
        }) => Eligibility::Granted {
            booking_type,
            cost,
            downgraded: true,
        },
        _ => Eligibility::denied(Denial::WeeklyLimitReached { used, limit }),
    }
}
