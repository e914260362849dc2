//! Storage abstraction with optimistic concurrency control.
//!
//! The booking engine never locks. Mutable documents (members, session
//! rosters, weekly usage counters) carry a [`Version`]; a transaction reads
//! them, decides, and submits a [`WriteBatch`] whose [`Precondition`]s name the
//! versions it read. The store applies the batch atomically only if every
//! precondition still holds, otherwise it rejects the whole batch with
//! [`StoreError::Conflict`] and the caller re-runs its decision on fresh data.
//!
//! Catalog documents (gyms, classes, tiers) are admin-edited and read without
//! preconditions. Credit log entries are append-only and never versioned.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` (in `gymbook-postgres`): production storage
//! - `InMemoryBookingStore` (in `gymbook-testing`): fast, deterministic tests

use crate::attendance::SessionRoster;
use crate::class::ClassSeries;
use crate::gym::{Gym, MembershipTier};
use crate::ids::{ClassId, GymId, MemberId, SessionKey, TierId, UsageKey};
use crate::ledger::CreditLogEntry;
use crate::member::Member;
use crate::usage::WeeklyUsage;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`BookingStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Document version. `0` means the document does not exist yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a document that has never been written.
    pub const ABSENT: Self = Self(0);

    /// Creates a version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version a successful write produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Version the value was read at
    pub version: Version,
    /// The document
    pub value: T,
}

impl<T> Versioned<T> {
    /// Pairs a value with its version.
    pub const fn new(version: Version, value: T) -> Self {
        Self { version, value }
    }
}

/// Reference to a versioned document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocRef {
    /// `users/{id}`
    Member(MemberId),
    /// Attendance of one session
    Roster(SessionKey),
    /// Weekly usage counter
    WeeklyUsage(UsageKey),
}

impl DocRef {
    /// Collection the document lives in.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Member(_) => "members",
            Self::Roster(_) => "rosters",
            Self::WeeklyUsage(_) => "weekly_usage",
        }
    }

    /// Document id within its collection.
    #[must_use]
    pub fn doc_id(&self) -> String {
        match self {
            Self::Member(id) => id.to_string(),
            Self::Roster(key) => key.to_string(),
            Self::WeeklyUsage(key) => key.to_string(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection(), self.doc_id())
    }
}

/// "This document must still be at this version."
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Precondition {
    /// Document read by the transaction
    pub doc: DocRef,
    /// Version it was read at
    pub expected: Version,
}

/// A staged write.
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    /// Replace a member document
    PutMember(Member),
    /// Replace a session roster
    PutRoster(SessionRoster),
    /// Replace a weekly usage counter
    PutWeeklyUsage(WeeklyUsage),
    /// Append a credit log entry
    AppendCreditLog(CreditLogEntry),
}

impl Write {
    /// The versioned document this write replaces, if any.
    #[must_use]
    pub fn doc_ref(&self) -> Option<DocRef> {
        match self {
            Self::PutMember(member) => Some(DocRef::Member(member.id.clone())),
            Self::PutRoster(roster) => Some(DocRef::Roster(roster.session.clone())),
            Self::PutWeeklyUsage(usage) => Some(DocRef::WeeklyUsage(usage.key.clone())),
            Self::AppendCreditLog(_) => None,
        }
    }
}

/// Writes applied atomically, guarded by preconditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    /// Versions that must still hold at commit time
    pub preconditions: SmallVec<[Precondition; 4]>,
    /// Writes in application order
    pub writes: SmallVec<[Write; 4]>,
}

impl WriteBatch {
    /// Whether the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Expected version for `doc`, if the batch read it.
    #[must_use]
    pub fn expected_version(&self, doc: &DocRef) -> Option<Version> {
        self.preconditions
            .iter()
            .find(|p| &p.doc == doc)
            .map(|p| p.expected)
    }
}

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: a document changed after it was read.
    ///
    /// The whole batch was rejected; re-read and retry.
    #[error("Concurrency conflict on {doc}: expected version {expected}, found {actual}")]
    Conflict {
        /// Document that changed
        doc: String,
        /// Version the transaction read
        expected: Version,
        /// Version found at commit time
        actual: Version,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether retrying the transaction may succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Storage abstraction for the booking engine.
///
/// # Dyn Compatibility
///
/// Methods return [`StoreFuture`] instead of using `async fn` so the store can
/// be shared as `Arc<dyn BookingStore>`.
pub trait BookingStore: Send + Sync {
    /// Load a gym.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn gym<'a>(&'a self, gym_id: &'a GymId) -> StoreFuture<'a, Option<Gym>>;

    /// Load a class series of a gym.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn class<'a>(
        &'a self,
        gym_id: &'a GymId,
        class_id: &'a ClassId,
    ) -> StoreFuture<'a, Option<ClassSeries>>;

    /// Load a membership tier of a gym.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn tier<'a>(
        &'a self,
        gym_id: &'a GymId,
        tier_id: &'a TierId,
    ) -> StoreFuture<'a, Option<MembershipTier>>;

    /// Load a member with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn member<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Option<Versioned<Member>>>;

    /// Load a session roster with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn roster<'a>(
        &'a self,
        session: &'a SessionKey,
    ) -> StoreFuture<'a, Option<Versioned<SessionRoster>>>;

    /// Load a weekly usage counter with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn weekly_usage<'a>(
        &'a self,
        key: &'a UsageKey,
    ) -> StoreFuture<'a, Option<Versioned<WeeklyUsage>>>;

    /// Credit log of a member, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the read fails.
    fn credit_log<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Vec<CreditLogEntry>>;

    /// Create or replace a gym.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn put_gym(&self, gym: Gym) -> StoreFuture<'_, ()>;

    /// Record the gym's connected payment account unless one is already set.
    ///
    /// Only that field changes; the rest of the gym document is left as
    /// stored. Returns the account id the gym holds afterwards, or `None` if
    /// the gym does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn claim_connect_account<'a>(
        &'a self,
        gym_id: &'a GymId,
        account_id: &'a str,
    ) -> StoreFuture<'a, Option<String>>;

    /// Create or replace a class series.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn put_class(&self, class: ClassSeries) -> StoreFuture<'_, ()>;

    /// Create or replace a membership tier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn put_tier(&self, tier: MembershipTier) -> StoreFuture<'_, ()>;

    /// Apply a batch atomically.
    ///
    /// Every precondition is checked before anything is written; each put
    /// bumps its document to `expected.next()` (or version 1 when the batch did
    /// not read the document).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`]: a precondition no longer holds; nothing was written
    /// - [`StoreError::Database`]: the write failed; nothing was written
    fn commit(&self, batch: WriteBatch) -> StoreFuture<'_, ()>;
}
