//! # Gymbook Core
//!
//! Domain types and storage traits for the gym class-booking engine.
//!
//! This crate holds everything the booking rules operate on and nothing that
//! performs I/O:
//!
//! - **Catalog**: [`Gym`], [`ClassSeries`], [`MembershipTier`]: admin-edited,
//!   read without concurrency guards
//! - **Mutable state**: [`Member`] (credit balance), [`SessionRoster`]
//!   (attendance of one session), [`WeeklyUsage`] (weekly cap counter). Every
//!   change goes through a versioned [`WriteBatch`]
//! - **Audit**: [`CreditLogEntry`], append-only
//! - **Environment**: [`Clock`] and the [`BookingStore`] trait
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use gymbook_core::{AttendanceId, SessionKey};
//!
//! let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default();
//! let session = SessionKey::new("gym-1".into(), "hiit".into(), date);
//!
//! assert_eq!(
//!     session.attendance_id(&"alice".into()),
//!     AttendanceId::new(&"hiit".into(), date, &"alice".into()),
//! );
//! ```

pub mod attendance;
pub mod class;
pub mod environment;
pub mod gym;
pub mod ids;
pub mod ledger;
pub mod member;
pub mod store;
pub mod usage;

// Re-export commonly used types
pub use attendance::{AttendanceRecord, AttendanceStatus, BookingType, SessionRoster};
pub use chrono::{DateTime, NaiveDate, Utc};
pub use class::{ClassSeries, Schedule, UNLIMITED_CAPACITY};
pub use environment::{Clock, SystemClock};
pub use gym::{BookingRules, Gym, LateCancelPolicy, MembershipTier};
pub use ids::{AttendanceId, ClassId, GymId, MemberId, SessionKey, TierId, UsageKey};
pub use ledger::{Actor, CreditLogEntry, CreditLogId, CreditLogKind};
pub use member::{GymMembership, Member, MembershipStatus};
pub use store::{
    BookingStore, DocRef, Precondition, StoreError, StoreFuture, Version, Versioned, Write,
    WriteBatch,
};
pub use usage::{WeeklyUsage, week_start};
