//! # Gymbook Runtime
//!
//! Execution support for the booking engine's optimistic concurrency model.
//!
//! ## Core Components
//!
//! - **[`Transaction`]**: reads documents through the store while recording
//!   their versions, stages writes, and commits them as one guarded batch
//! - **[`retry_on_conflict`]**: re-runs a whole read-decide-commit cycle with
//!   exponential backoff when the commit lost a race
//!
//! ## Example
//!
//! ```ignore
//! use gymbook_runtime::{RetryPolicy, Transaction, retry_on_conflict};
//!
//! let store: &dyn BookingStore = /* ... */;
//! retry_on_conflict(&RetryPolicy::default(), || async move {
//!     let mut tx = Transaction::begin(store);
//!     let mut member = tx.member(&member_id).await?.ok_or(/* ... */)?;
//!     member.class_credits += 5;
//!     tx.put_member(member);
//!     tx.commit().await
//! })
//! .await?;
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Optimistic transactions over a booking store
pub mod transaction;

pub use retry::{RetryPolicy, RetryPolicyBuilder, Retryable, retry_on_conflict};
pub use transaction::Transaction;
