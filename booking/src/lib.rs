//! Gym class booking engine.
//!
//! Decides whether a member may book a class session, seats them or queues
//! them on a waitlist, keeps credit balances and their audit trail in step,
//! and exposes the operations over a thin JSON API.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (api)                    Stripe Connect (account_link)
//!        │
//!        ▼
//!   BookingService ── retry_on_conflict ── Transaction ── BookingStore
//!        │                                                  (Postgres / memory)
//!        ├── eligibility   access path and cost
//!        ├── waitlist      seats, FIFO promotion
//!        └── ledger        balance + log entry, always together
//! ```
//!
//! Every mutating operation is a single optimistic transaction: concurrent
//! bookings for the last seat race on the roster version, the loser re-runs
//! against fresh data and lands on the waitlist.
//!
//! # Example
//!
//! ```ignore
//! let env = BookingEnvironment::new(store, &config.booking);
//! let service = BookingService::new(env);
//! let outcome = service
//!     .book_member(&session, &member_id, BookingOptions::member())
//!     .await?;
//! println!("{} ({} credits left)", outcome.record.status, outcome.credits_remaining);
//! ```

pub mod account_link;
pub mod api;
pub mod config;
pub mod eligibility;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod service;
pub mod waitlist;

pub use account_link::{AccountLinkError, AccountLinkService, ConnectGateway, MockConnectGateway};
pub use config::Config;
pub use eligibility::{Denial, Eligibility, EligibilityInput, can_user_book};
pub use environment::{BookingDefaults, BookingEnvironment};
pub use error::{BookingError, BookingResult};
pub use service::{
    BookingOptions, BookingOutcome, BookingService, CancelOptions, CancellationOutcome,
    CreditMutation, NoShowOutcome, PromotionReport, RosterView,
};
