//! In-memory [`BookingStore`] with the same compare-and-swap semantics as the
//! Postgres store.

use gymbook_core::{
    BookingStore, ClassId, ClassSeries, CreditLogEntry, DocRef, Gym, GymId, Member, MemberId,
    MembershipTier, SessionKey, SessionRoster, StoreError, StoreFuture, TierId, UsageKey,
    Version, Versioned, WeeklyUsage, Write, WriteBatch,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    gyms: HashMap<GymId, Gym>,
    classes: HashMap<(GymId, ClassId), ClassSeries>,
    tiers: HashMap<(GymId, TierId), MembershipTier>,
    members: HashMap<MemberId, Versioned<Member>>,
    rosters: HashMap<SessionKey, Versioned<SessionRoster>>,
    usage: HashMap<UsageKey, Versioned<WeeklyUsage>>,
    credit_logs: Vec<CreditLogEntry>,
    commits: usize,
}

impl Inner {
    fn version_of(&self, doc: &DocRef) -> Version {
        match doc {
            DocRef::Member(id) => self.members.get(id).map(|v| v.version),
            DocRef::Roster(key) => self.rosters.get(key).map(|v| v.version),
            DocRef::WeeklyUsage(key) => self.usage.get(key).map(|v| v.version),
        }
        .unwrap_or(Version::ABSENT)
    }

    fn apply(&mut self, write: Write) {
        let next = write
            .doc_ref()
            .map_or(Version::ABSENT, |doc| self.version_of(&doc).next());
        match write {
            Write::PutMember(member) => {
                self.members
                    .insert(member.id.clone(), Versioned::new(next, member));
            }
            Write::PutRoster(roster) => {
                self.rosters
                    .insert(roster.session.clone(), Versioned::new(next, roster));
            }
            Write::PutWeeklyUsage(usage) => {
                self.usage.insert(usage.key.clone(), Versioned::new(next, usage));
            }
            Write::AppendCreditLog(entry) => self.credit_logs.push(entry),
        }
    }
}

/// Thread-safe in-memory store for tests.
///
/// Clones share the same data. Two knobs help exercise concurrency:
///
/// - [`fail_next_commits`](Self::fail_next_commits) rejects the next `n`
///   commits with a conflict, as if another writer had won
/// - [`yield_on_reads`](Self::yield_on_reads) yields to the scheduler before
///   every versioned read so concurrent tasks interleave between read and commit
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<Mutex<Inner>>,
    injected_conflicts: Arc<AtomicUsize>,
    yield_reads: Arc<AtomicBool>,
}

impl InMemoryBookingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler before every versioned read.
    #[must_use]
    pub fn yield_on_reads(self) -> Self {
        self.yield_reads.store(true, Ordering::SeqCst);
        self
    }

    /// Reject the next `n` commits with a conflict.
    pub fn fail_next_commits(&self, n: usize) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.lock().map_or(0, |inner| inner.commits)
    }

    /// Every credit log entry in append order.
    #[must_use]
    pub fn all_credit_logs(&self) -> Vec<CreditLogEntry> {
        self.lock()
            .map(|inner| inner.credit_logs.clone())
            .unwrap_or_default()
    }

    /// Insert or replace a member outside any transaction, bumping its version.
    pub fn seed_member(&self, member: Member) {
        if let Ok(mut inner) = self.lock() {
            inner.apply(Write::PutMember(member));
        }
    }

    /// Insert or replace a roster outside any transaction, bumping its version.
    pub fn seed_roster(&self, roster: SessionRoster) {
        if let Ok(mut inner) = self.lock() {
            inner.apply(Write::PutRoster(roster));
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("in-memory store lock poisoned".to_string()))
    }

    async fn maybe_yield(&self) {
        if self.yield_reads.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

impl BookingStore for InMemoryBookingStore {
    fn gym<'a>(&'a self, gym_id: &'a GymId) -> StoreFuture<'a, Option<Gym>> {
        Box::pin(async move { Ok(self.lock()?.gyms.get(gym_id).cloned()) })
    }

    fn class<'a>(
        &'a self,
        gym_id: &'a GymId,
        class_id: &'a ClassId,
    ) -> StoreFuture<'a, Option<ClassSeries>> {
        Box::pin(async move {
            let key = (gym_id.clone(), class_id.clone());
            Ok(self.lock()?.classes.get(&key).cloned())
        })
    }

    fn tier<'a>(
        &'a self,
        gym_id: &'a GymId,
        tier_id: &'a TierId,
    ) -> StoreFuture<'a, Option<MembershipTier>> {
        Box::pin(async move {
            let key = (gym_id.clone(), tier_id.clone());
            Ok(self.lock()?.tiers.get(&key).cloned())
        })
    }

    fn member<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Option<Versioned<Member>>> {
        Box::pin(async move {
            self.maybe_yield().await;
            Ok(self.lock()?.members.get(member_id).cloned())
        })
    }

    fn roster<'a>(
        &'a self,
        session: &'a SessionKey,
    ) -> StoreFuture<'a, Option<Versioned<SessionRoster>>> {
        Box::pin(async move {
            self.maybe_yield().await;
            Ok(self.lock()?.rosters.get(session).cloned())
        })
    }

    fn weekly_usage<'a>(
        &'a self,
        key: &'a UsageKey,
    ) -> StoreFuture<'a, Option<Versioned<WeeklyUsage>>> {
        Box::pin(async move {
            self.maybe_yield().await;
            Ok(self.lock()?.usage.get(key).cloned())
        })
    }

    fn credit_log<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Vec<CreditLogEntry>> {
        Box::pin(async move {
            Ok(self
                .lock()?
                .credit_logs
                .iter()
                .rev()
                .filter(|entry| &entry.member_id == member_id)
                .cloned()
                .collect())
        })
    }

    fn put_gym(&self, gym: Gym) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.lock()?.gyms.insert(gym.id.clone(), gym);
            Ok(())
        })
    }

    fn claim_connect_account<'a>(
        &'a self,
        gym_id: &'a GymId,
        account_id: &'a str,
    ) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            Ok(inner.gyms.get_mut(gym_id).map(|gym| {
                gym.stripe_account_id
                    .get_or_insert_with(|| account_id.to_string())
                    .clone()
            }))
        })
    }

    fn put_class(&self, class: ClassSeries) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let key = (class.gym_id.clone(), class.id.clone());
            self.lock()?.classes.insert(key, class);
            Ok(())
        })
    }

    fn put_tier(&self, tier: MembershipTier) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let key = (tier.gym_id.clone(), tier.id.clone());
            self.lock()?.tiers.insert(key, tier);
            Ok(())
        })
    }

    fn commit(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.lock()?;

            let injected = self
                .injected_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                let doc = batch
                    .preconditions
                    .first()
                    .map_or_else(|| "<batch>".to_string(), |p| p.doc.to_string());
                return Err(StoreError::Conflict {
                    doc,
                    expected: Version::ABSENT,
                    actual: Version::ABSENT,
                });
            }

            for precondition in &batch.preconditions {
                let actual = inner.version_of(&precondition.doc);
                if actual != precondition.expected {
                    return Err(StoreError::Conflict {
                        doc: precondition.doc.to_string(),
                        expected: precondition.expected,
                        actual,
                    });
                }
            }

            for write in batch.writes {
                inner.apply(write);
            }
            inner.commits += 1;
            Ok(())
        })
    }
}
