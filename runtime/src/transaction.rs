//! Optimistic read-modify-write transactions over a [`BookingStore`].
//!
//! A [`Transaction`] remembers the version of every mutable document it reads
//! and stages writes in memory. [`Transaction::commit`] hands the store one
//! [`WriteBatch`] whose preconditions are those versions, so the batch lands
//! only if nothing it looked at changed in the meantime.
//!
//! Business logic therefore never needs locks: read through the transaction,
//! decide, stage writes, commit, and let [`retry_on_conflict`] re-run the whole
//! closure when another writer got there first.
//!
//! [`retry_on_conflict`]: crate::retry::retry_on_conflict

use gymbook_core::{
    BookingStore, ClassId, ClassSeries, CreditLogEntry, DocRef, Gym, GymId, Member, MemberId,
    MembershipTier, Precondition, SessionKey, SessionRoster, StoreError, TierId, UsageKey,
    Version, WeeklyUsage, Write, WriteBatch,
};

/// An in-flight optimistic transaction.
pub struct Transaction<'s> {
    store: &'s dyn BookingStore,
    batch: WriteBatch,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

impl<'s> Transaction<'s> {
    /// Start a transaction against `store`.
    #[must_use]
    pub fn begin(store: &'s dyn BookingStore) -> Self {
        Self {
            store,
            batch: WriteBatch::default(),
        }
    }

    /// Record the version a document was read at.
    ///
    /// Reading the same document twice at different versions means another
    /// writer committed in between; the transaction can no longer commit, so it
    /// fails early with a conflict.
    fn observe(&mut self, doc: DocRef, version: Version) -> Result<(), StoreError> {
        match self.batch.expected_version(&doc) {
            Some(expected) if expected != version => Err(StoreError::Conflict {
                doc: doc.to_string(),
                expected,
                actual: version,
            }),
            Some(_) => Ok(()),
            None => {
                self.batch.preconditions.push(Precondition {
                    doc,
                    expected: version,
                });
                Ok(())
            }
        }
    }

    /// Read a gym (catalog, unguarded).
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn gym(&self, gym_id: &GymId) -> Result<Option<Gym>, StoreError> {
        self.store.gym(gym_id).await
    }

    /// Read a class series (catalog, unguarded).
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn class(
        &self,
        gym_id: &GymId,
        class_id: &ClassId,
    ) -> Result<Option<ClassSeries>, StoreError> {
        self.store.class(gym_id, class_id).await
    }

    /// Read a membership tier (catalog, unguarded).
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn tier(
        &self,
        gym_id: &GymId,
        tier_id: &TierId,
    ) -> Result<Option<MembershipTier>, StoreError> {
        self.store.tier(gym_id, tier_id).await
    }

    /// Read a member and guard it.
    ///
    /// A missing member is guarded too: creating it concurrently conflicts.
    ///
    /// # Errors
    ///
    /// Propagates store read failures, or a conflict if the member was already
    /// read at another version.
    pub async fn member(&mut self, member_id: &MemberId) -> Result<Option<Member>, StoreError> {
        let found = self.store.member(member_id).await?;
        let version = found.as_ref().map_or(Version::ABSENT, |v| v.version);
        self.observe(DocRef::Member(member_id.clone()), version)?;
        Ok(found.map(|v| v.value))
    }

    /// Read a session roster and guard it. Absent rosters read as empty.
    ///
    /// # Errors
    ///
    /// Propagates store read failures, or a conflict if the roster was already
    /// read at another version.
    pub async fn roster(&mut self, session: &SessionKey) -> Result<SessionRoster, StoreError> {
        let found = self.store.roster(session).await?;
        let version = found.as_ref().map_or(Version::ABSENT, |v| v.version);
        self.observe(DocRef::Roster(session.clone()), version)?;
        Ok(found.map_or_else(|| SessionRoster::empty(session.clone()), |v| v.value))
    }

    /// Read a weekly usage counter and guard it. Absent counters read as zero.
    ///
    /// # Errors
    ///
    /// Propagates store read failures, or a conflict if the counter was
    /// already read at another version.
    pub async fn weekly_usage(&mut self, key: &UsageKey) -> Result<WeeklyUsage, StoreError> {
        let found = self.store.weekly_usage(key).await?;
        let version = found.as_ref().map_or(Version::ABSENT, |v| v.version);
        self.observe(DocRef::WeeklyUsage(key.clone()), version)?;
        Ok(found.map_or_else(|| WeeklyUsage::empty(key.clone()), |v| v.value))
    }

    /// Stage a member write.
    pub fn put_member(&mut self, member: Member) {
        self.stage(Write::PutMember(member));
    }

    /// Stage a roster write.
    pub fn put_roster(&mut self, roster: SessionRoster) {
        self.stage(Write::PutRoster(roster));
    }

    /// Stage a weekly usage write.
    pub fn put_weekly_usage(&mut self, usage: WeeklyUsage) {
        self.stage(Write::PutWeeklyUsage(usage));
    }

    /// Stage a credit log append.
    pub fn append_credit_log(&mut self, entry: CreditLogEntry) {
        self.batch.writes.push(Write::AppendCreditLog(entry));
    }

    /// Later puts of the same document replace earlier ones.
    fn stage(&mut self, write: Write) {
        let doc = write.doc_ref();
        if let Some(existing) = self
            .batch
            .writes
            .iter_mut()
            .find(|w| doc.is_some() && w.doc_ref() == doc)
        {
            *existing = write;
        } else {
            self.batch.writes.push(write);
        }
    }

    /// Credit log entries staged so far.
    pub fn staged_credit_log(&self) -> impl Iterator<Item = &CreditLogEntry> {
        self.batch.writes.iter().filter_map(|write| match write {
            Write::AppendCreditLog(entry) => Some(entry),
            _ => None,
        })
    }

    /// Staged writes and read guards.
    #[must_use]
    pub const fn batch(&self) -> &WriteBatch {
        &self.batch
    }

    /// Submit the batch. A transaction that staged nothing commits trivially.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`]: something read by this transaction changed
    /// - [`StoreError::Database`]: the store failed; nothing was written
    pub async fn commit(self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.commit(self.batch).await
    }
}
