//! `PostgreSQL` storage for the gym booking engine.
//!
//! Every document lives in one `documents` table as JSONB, keyed by
//! `(collection, doc_id)` and carrying a `version` column. A
//! [`WriteBatch`] is applied inside one database transaction:
//!
//! - a write whose document was read at version `0` is an `INSERT` that must
//!   not find an existing row
//! - a write whose document was read at version `v` is an `UPDATE ... WHERE
//!   version = v` that must touch exactly one row
//! - a document that was read but not written is re-checked with
//!   `SELECT ... FOR SHARE`
//!
//! Any mismatch rolls the transaction back and reports
//! [`StoreError::Conflict`], which the booking runtime retries.
//!
//! Credit log entries go to the append-only `credit_logs` table.
//!
//! # Example
//!
//! ```no_run
//! use gymbook_postgres::PostgresBookingStore;
//!
//! # async fn example() -> Result<(), gymbook_core::StoreError> {
//! let store = PostgresBookingStore::new("postgres://localhost/gymbook").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use gymbook_core::{
    BookingStore, ClassId, ClassSeries, CreditLogEntry, DocRef, Gym, GymId, Member, MemberId,
    MembershipTier, SessionKey, SessionRoster, StoreError, StoreFuture, TierId, UsageKey,
    Version, Versioned, WeeklyUsage, Write, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

const GYMS: &str = "gyms";
const CLASSES: &str = "classes";
const TIERS: &str = "tiers";

const SCHEMA: [&str; 4] = [
    r"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        doc_id TEXT NOT NULL,
        version BIGINT NOT NULL,
        body JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, doc_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS credit_logs (
        seq BIGSERIAL PRIMARY KEY,
        id UUID NOT NULL UNIQUE,
        member_id TEXT NOT NULL,
        gym_id TEXT,
        amount BIGINT NOT NULL,
        kind TEXT NOT NULL,
        body JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_credit_logs_member ON credit_logs(member_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(updated_at)",
];

/// Connection pool settings.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Idle connections kept open
    pub min_connections: u32,
    /// How long to wait for a connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// [`BookingStore`] backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect(database_url, &PoolSettings::default()).await
    }

    /// Connect with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(database_error)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(database_error)?;
        }
        tracing::info!("Booking store schema ready");
        Ok(())
    }

    async fn load<T: DeserializeOwned>(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<Versioned<T>>, StoreError> {
        let row: Option<(i64, serde_json::Value)> = sqlx::query_as(
            "SELECT version, body FROM documents WHERE collection = $1 AND doc_id = $2",
        )
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.map(|(version, body)| {
            let value = serde_json::from_value(body).map_err(serialization_error)?;
            Ok(Versioned::new(from_db_version(version), value))
        })
        .transpose()
    }

    async fn put_catalog<T: Serialize + Sync>(
        &self,
        collection: &str,
        doc_id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_value(value).map_err(serialization_error)?;
        sqlx::query(
            r"
            INSERT INTO documents (collection, doc_id, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, doc_id)
            DO UPDATE SET body = EXCLUDED.body, version = documents.version + 1, updated_at = now()
            ",
        )
        .bind(collection)
        .bind(doc_id)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        let written: Vec<DocRef> = batch.writes.iter().filter_map(Write::doc_ref).collect();
        for precondition in batch
            .preconditions
            .iter()
            .filter(|p| !written.contains(&p.doc))
        {
            let actual = current_version(&mut tx, &precondition.doc, true).await?;
            if actual != precondition.expected {
                return Err(StoreError::Conflict {
                    doc: precondition.doc.to_string(),
                    expected: precondition.expected,
                    actual,
                });
            }
        }

        for write in &batch.writes {
            match write {
                Write::AppendCreditLog(entry) => append_credit_log(&mut tx, entry).await?,
                Write::PutMember(member) => {
                    put_versioned(&mut tx, &batch, write, to_body(member)?).await?;
                }
                Write::PutRoster(roster) => {
                    put_versioned(&mut tx, &batch, write, to_body(roster)?).await?;
                }
                Write::PutWeeklyUsage(usage) => {
                    put_versioned(&mut tx, &batch, write, to_body(usage)?).await?;
                }
            }
        }

        tx.commit().await.map_err(database_error)
    }
}

type PgTransaction = sqlx::Transaction<'static, Postgres>;

async fn current_version(
    tx: &mut PgTransaction,
    doc: &DocRef,
    lock: bool,
) -> Result<Version, StoreError> {
    let sql = if lock {
        "SELECT version FROM documents WHERE collection = $1 AND doc_id = $2 FOR SHARE"
    } else {
        "SELECT version FROM documents WHERE collection = $1 AND doc_id = $2"
    };
    let row: Option<(i64,)> = sqlx::query_as(sql)
        .bind(doc.collection())
        .bind(doc.doc_id())
        .fetch_optional(&mut **tx)
        .await
        .map_err(database_error)?;
    Ok(row.map_or(Version::ABSENT, |(version,)| from_db_version(version)))
}

async fn put_versioned(
    tx: &mut PgTransaction,
    batch: &WriteBatch,
    write: &Write,
    body: serde_json::Value,
) -> Result<(), StoreError> {
    let Some(doc) = write.doc_ref() else {
        return Ok(());
    };

    let affected = match batch.expected_version(&doc) {
        Some(expected) if expected == Version::ABSENT => sqlx::query(
            r"
            INSERT INTO documents (collection, doc_id, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, doc_id) DO NOTHING
            ",
        )
        .bind(doc.collection())
        .bind(doc.doc_id())
        .bind(body)
        .execute(&mut **tx)
        .await
        .map_err(database_error)?
        .rows_affected(),
        Some(expected) => sqlx::query(
            r"
            UPDATE documents
            SET body = $3, version = version + 1, updated_at = now()
            WHERE collection = $1 AND doc_id = $2 AND version = $4
            ",
        )
        .bind(doc.collection())
        .bind(doc.doc_id())
        .bind(body)
        .bind(to_db_version(expected))
        .execute(&mut **tx)
        .await
        .map_err(database_error)?
        .rows_affected(),
        None => sqlx::query(
            r"
            INSERT INTO documents (collection, doc_id, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (collection, doc_id)
            DO UPDATE SET body = EXCLUDED.body, version = documents.version + 1, updated_at = now()
            ",
        )
        .bind(doc.collection())
        .bind(doc.doc_id())
        .bind(body)
        .execute(&mut **tx)
        .await
        .map_err(database_error)?
        .rows_affected(),
    };

    if affected == 1 {
        return Ok(());
    }

    let expected = batch.expected_version(&doc).unwrap_or(Version::ABSENT);
    let actual = current_version(tx, &doc, false).await?;
    Err(StoreError::Conflict {
        doc: doc.to_string(),
        expected,
        actual,
    })
}

async fn append_credit_log(tx: &mut PgTransaction, entry: &CreditLogEntry) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO credit_logs (id, member_id, gym_id, amount, kind, body, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(*entry.id.as_uuid())
    .bind(entry.member_id.as_str())
    .bind(entry.gym_id.as_ref().map(GymId::as_str))
    .bind(entry.amount)
    .bind(entry.kind.as_str())
    .bind(to_body(entry)?)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(database_error)?;
    Ok(())
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(serialization_error)
}

fn from_db_version(version: i64) -> Version {
    Version::new(u64::try_from(version).unwrap_or_default())
}

fn to_db_version(version: Version) -> i64 {
    i64::try_from(version.value()).unwrap_or(i64::MAX)
}

#[allow(clippy::needless_pass_by_value)]
fn database_error(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

#[allow(clippy::needless_pass_by_value)]
fn serialization_error(error: serde_json::Error) -> StoreError {
    StoreError::Serialization(error.to_string())
}

fn scoped_id(gym_id: &GymId, id: &str) -> String {
    format!("{gym_id}/{id}")
}

impl BookingStore for PostgresBookingStore {
    fn gym<'a>(&'a self, gym_id: &'a GymId) -> StoreFuture<'a, Option<Gym>> {
        Box::pin(async move {
            Ok(self
                .load::<Gym>(GYMS, gym_id.as_str())
                .await?
                .map(|v| v.value))
        })
    }

    fn class<'a>(
        &'a self,
        gym_id: &'a GymId,
        class_id: &'a ClassId,
    ) -> StoreFuture<'a, Option<ClassSeries>> {
        Box::pin(async move {
            let doc_id = scoped_id(gym_id, class_id.as_str());
            Ok(self
                .load::<ClassSeries>(CLASSES, &doc_id)
                .await?
                .map(|v| v.value))
        })
    }

    fn tier<'a>(
        &'a self,
        gym_id: &'a GymId,
        tier_id: &'a TierId,
    ) -> StoreFuture<'a, Option<MembershipTier>> {
        Box::pin(async move {
            let doc_id = scoped_id(gym_id, tier_id.as_str());
            Ok(self
                .load::<MembershipTier>(TIERS, &doc_id)
                .await?
                .map(|v| v.value))
        })
    }

    fn member<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Option<Versioned<Member>>> {
        Box::pin(async move {
            let doc = DocRef::Member(member_id.clone());
            self.load(doc.collection(), &doc.doc_id()).await
        })
    }

    fn roster<'a>(
        &'a self,
        session: &'a SessionKey,
    ) -> StoreFuture<'a, Option<Versioned<SessionRoster>>> {
        Box::pin(async move {
            let doc = DocRef::Roster(session.clone());
            self.load(doc.collection(), &doc.doc_id()).await
        })
    }

    fn weekly_usage<'a>(
        &'a self,
        key: &'a UsageKey,
    ) -> StoreFuture<'a, Option<Versioned<WeeklyUsage>>> {
        Box::pin(async move {
            let doc = DocRef::WeeklyUsage(key.clone());
            self.load(doc.collection(), &doc.doc_id()).await
        })
    }

    fn credit_log<'a>(&'a self, member_id: &'a MemberId) -> StoreFuture<'a, Vec<CreditLogEntry>> {
        Box::pin(async move {
            let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
                "SELECT body FROM credit_logs WHERE member_id = $1 ORDER BY created_at DESC, seq DESC",
            )
            .bind(member_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

            rows.into_iter()
                .map(|(body,)| serde_json::from_value(body).map_err(serialization_error))
                .collect()
        })
    }

    fn put_gym(&self, gym: Gym) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.put_catalog(GYMS, gym.id.as_str(), &gym).await })
    }

    fn claim_connect_account<'a>(
        &'a self,
        gym_id: &'a GymId,
        account_id: &'a str,
    ) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let claimed: Option<(Option<String>,)> = sqlx::query_as(
                r"
                UPDATE documents
                SET body = jsonb_set(body, '{stripe_account_id}', to_jsonb($3::text)),
                    version = version + 1,
                    updated_at = now()
                WHERE collection = $1 AND doc_id = $2
                  AND body->>'stripe_account_id' IS NULL
                RETURNING body->>'stripe_account_id'
                ",
            )
            .bind(GYMS)
            .bind(gym_id.as_str())
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;
            if let Some((account,)) = claimed {
                return Ok(account);
            }

            let existing: Option<(Option<String>,)> = sqlx::query_as(
                "SELECT body->>'stripe_account_id' FROM documents WHERE collection = $1 AND doc_id = $2",
            )
            .bind(GYMS)
            .bind(gym_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;
            Ok(existing.and_then(|(account,)| account))
        })
    }

    fn put_class(&self, class: ClassSeries) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let doc_id = scoped_id(&class.gym_id, class.id.as_str());
            self.put_catalog(CLASSES, &doc_id, &class).await
        })
    }

    fn put_tier(&self, tier: MembershipTier) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let doc_id = scoped_id(&tier.gym_id, tier.id.as_str());
            self.put_catalog(TIERS, &doc_id, &tier).await
        })
    }

    fn commit(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let writes = batch.writes.len();
            match self.apply(batch).await {
                Ok(()) => {
                    metrics::counter!("gym_booking_store_commits_total", "outcome" => "committed")
                        .increment(1);
                    tracing::debug!(writes, "Write batch committed");
                    Ok(())
                }
                Err(error) => {
                    let outcome = if error.is_conflict() { "conflict" } else { "error" };
                    metrics::counter!("gym_booking_store_commits_total", "outcome" => outcome)
                        .increment(1);
                    Err(error)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_round_trip_through_bigint() {
        assert_eq!(from_db_version(to_db_version(Version::new(7))), Version::new(7));
        assert_eq!(from_db_version(-1), Version::ABSENT);
    }

    #[test]
    fn catalog_ids_are_scoped_by_gym() {
        assert_eq!(scoped_id(&"gym-1".into(), "hiit"), "gym-1/hiit");
    }
}
