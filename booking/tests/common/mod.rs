//! Shared harness for booking integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_booking::{BookingEnvironment, BookingService, config::BookingConfig};
use gymbook_core::{BookingStore, ClassSeries, Member, MembershipTier};
use gymbook_runtime::RetryPolicy;
use gymbook_testing::{InMemoryBookingStore, MockClock, fixtures};
use std::sync::Arc;

/// A service over an in-memory store with a controllable clock.
pub struct Harness {
    pub store: InMemoryBookingStore,
    pub clock: MockClock,
    pub service: BookingService,
}

impl Harness {
    /// Default gym seeded, clock at noon on the session day.
    pub async fn new() -> Self {
        Self::with_store(InMemoryBookingStore::new()).await
    }

    pub async fn with_store(store: InMemoryBookingStore) -> Self {
        store.put_gym(fixtures::gym()).await.unwrap();
        let clock = MockClock::new(at(12, 0));
        let env = BookingEnvironment::new(Arc::new(store.clone()), &BookingConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .with_retry(fast_retry());
        Self {
            store,
            clock,
            service: BookingService::new(env),
        }
    }

    pub async fn class(&self, class: ClassSeries) {
        self.store.put_class(class).await.unwrap();
    }

    pub async fn tier(&self, tier: MembershipTier) {
        self.store.put_tier(tier).await.unwrap();
    }

    pub fn member(&self, member: Member) {
        self.store.seed_member(member);
    }

    pub async fn balance(&self, member_id: &str) -> i64 {
        self.store
            .member(&member_id.into())
            .await
            .unwrap()
            .unwrap()
            .value
            .class_credits
    }

    /// Move the clock forward a little so `booked_at` orders bookings.
    pub fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
    }
}

/// `hh:mm` UTC on the default session date.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, hour, minute, 0).unwrap()
}

/// Retries fast enough for tests and plenty of them for contention.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(200)
        .initial_delay(std::time::Duration::from_millis(1))
        .max_delay(std::time::Duration::from_millis(5))
        .build()
}

/// The default class with `capacity` seats costing `cost` credits.
pub fn class_with(capacity: u32, cost: u32) -> ClassSeries {
    let mut class = fixtures::class("hiit");
    class.max_capacity = Some(capacity);
    class.credit_cost = cost;
    class
}
