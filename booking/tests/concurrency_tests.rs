//! Concurrent bookings against one session.
//!
//! The in-memory store yields between every read and the commit, so tasks on
//! the multi-threaded runtime interleave inside their transactions and the
//! losers of each race go through the conflict retry path.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::{Harness, class_with};
use gym_booking::{BookingError, BookingOptions};
use gymbook_core::{AttendanceStatus, MemberId};
use gymbook_testing::{InMemoryBookingStore, fixtures};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_members_never_overfill_the_class() {
    let h = Harness::with_store(InMemoryBookingStore::new().yield_on_reads()).await;
    h.class(class_with(5, 1)).await;
    let members: Vec<String> = (0..20).map(|i| format!("member-{i:02}")).collect();
    for member in &members {
        h.member(fixtures::member(member, 1));
    }

    let mut handles = Vec::new();
    for member in &members {
        let service = h.service.clone();
        let member_id = MemberId::new(member.as_str());
        handles.push(tokio::spawn(async move {
            service
                .book_member(&fixtures::session(), &member_id, BookingOptions::member())
                .await
        }));
    }

    let mut booked = 0;
    let mut waitlisted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap().record.status {
            AttendanceStatus::Booked => booked += 1,
            AttendanceStatus::Waitlisted => waitlisted += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(booked, 5);
    assert_eq!(waitlisted, 15);

    let roster = h.service.session_roster(&fixtures::session()).await.unwrap();
    assert_eq!(roster.active, 5);
    assert_eq!(roster.waitlisted, 15);

    // Every booking was charged exactly once, whatever it took to commit
    assert_eq!(h.store.all_credit_logs().len(), 20);
    for member in &members {
        assert_eq!(h.balance(member).await, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_submissions_book_once() {
    let h = Harness::with_store(InMemoryBookingStore::new().yield_on_reads()).await;
    h.class(class_with(10, 1)).await;
    h.member(fixtures::member("alice", 5));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .book_member(
                    &fixtures::session(),
                    &MemberId::new("alice"),
                    BookingOptions::member(),
                )
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(
                matches!(err, BookingError::AlreadyBooked { .. }),
                "unexpected error {err}"
            ),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.balance("alice").await, 4);
    assert_eq!(h.store.all_credit_logs().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancellations_promote_each_waiter_once() {
    let h = Harness::with_store(InMemoryBookingStore::new().yield_on_reads()).await;
    let mut class = class_with(3, 0);
    class.drop_in_enabled = true;
    h.class(class).await;

    let seated = ["s1", "s2", "s3"];
    let queued = ["q1", "q2", "q3", "q4"];
    for member in seated.iter().chain(queued.iter()) {
        h.member(fixtures::member(member, 0));
        h.service
            .book_member(&fixtures::session(), &MemberId::new(*member), BookingOptions::member())
            .await
            .unwrap();
        h.tick();
    }

    let mut handles = Vec::new();
    for member in seated {
        let service = h.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .cancel_booking(
                    &fixtures::session(),
                    &MemberId::new(member),
                    gym_booking::CancelOptions::default(),
                )
                .await
        }));
    }

    let mut promoted = Vec::new();
    for handle in handles {
        promoted.extend(handle.await.unwrap().unwrap().promoted);
    }
    promoted.sort();

    assert_eq!(
        promoted,
        vec![MemberId::new("q1"), MemberId::new("q2"), MemberId::new("q3")]
    );
    let roster = h.service.session_roster(&fixtures::session()).await.unwrap();
    assert_eq!(roster.active, 3);
    assert_eq!(roster.waitlisted, 1);
}
