//! Property tests for the capacity, waitlist and ledger rules.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, NaiveTime, Utc};
use gym_booking::ledger::{self, CreditChange};
use gym_booking::waitlist;
use gymbook_core::{
    Actor, AttendanceRecord, AttendanceStatus, BookingType, CreditLogKind, MemberId,
    SessionRoster,
};
use gymbook_testing::fixtures;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Book { member: u8, force: bool },
    Cancel { member: u8 },
    NoShow { member: u8 },
    Process,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..12u8, prop::bool::weighted(0.1))
            .prop_map(|(member, force)| Op::Book { member, force }),
        2 => (0..12u8).prop_map(|member| Op::Cancel { member }),
        1 => (0..12u8).prop_map(|member| Op::NoShow { member }),
        1 => Just(Op::Process),
    ]
}

fn record(member_id: &MemberId, status: AttendanceStatus, at: DateTime<Utc>) -> AttendanceRecord {
    let session = fixtures::session();
    AttendanceRecord {
        id: session.attendance_id(member_id),
        session,
        member_id: member_id.clone(),
        status,
        booking_type: BookingType::DropIn,
        cost_used: 0,
        booked_at: at,
        cancelled_at: None,
        promoted_at: None,
        checked_in_at: None,
        refunded: false,
        late_cancel: false,
        member_name: member_id.to_string(),
        member_photo: None,
        class_name: "HIIT".to_string(),
        class_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
    }
}

/// Earliest waitlisted member, computed independently of the roster helpers.
fn expected_head(roster: &SessionRoster) -> Option<MemberId> {
    roster
        .records
        .values()
        .filter(|r| r.status == AttendanceStatus::Waitlisted)
        .min_by_key(|r| (r.booked_at, r.member_id.clone()))
        .map(|r| r.member_id.clone())
}

proptest! {
    #[test]
    fn roster_rules_hold_for_any_operation_sequence(
        capacity in 1..6u32,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut roster = SessionRoster::empty(fixtures::session());
        let mut now = fixtures::epoch();
        let mut forced = false;

        for op in ops {
            now += Duration::seconds(1);
            match op {
                Op::Book { member, force } => {
                    let member_id = MemberId::new(format!("m{member}"));
                    if roster.record(&member_id).is_some_and(|r| r.status.is_live()) {
                        continue;
                    }
                    let placement = waitlist::place(&roster, capacity, force);
                    if force && roster.active_count() >= capacity {
                        forced = true;
                    }
                    if placement == waitlist::Placement::Booked && !force {
                        prop_assert!(roster.active_count() < capacity);
                        prop_assert_eq!(roster.waitlist_len(), 0);
                    }
                    roster
                        .records
                        .insert(member_id.clone(), record(&member_id, placement.status(), now));
                }
                Op::Cancel { member } | Op::NoShow { member } => {
                    let member_id = MemberId::new(format!("m{member}"));
                    let Some(current) = roster.records.get(&member_id).map(|r| r.status) else {
                        continue;
                    };
                    let no_show = matches!(op, Op::NoShow { .. });
                    let next = match (no_show, current) {
                        (true, AttendanceStatus::Booked) => AttendanceStatus::NoShow,
                        (false, AttendanceStatus::Booked | AttendanceStatus::Waitlisted) => {
                            AttendanceStatus::Cancelled
                        }
                        _ => continue,
                    };
                    let head = expected_head(&roster);
                    roster.records.get_mut(&member_id).unwrap().status = next;
                    let promoted = if current.is_active() {
                        waitlist::promote_into_freed_seat(&mut roster, capacity, now)
                    } else {
                        None
                    };
                    if let Some(promoted) = promoted {
                        prop_assert_eq!(Some(promoted.clone()), head);
                        prop_assert_eq!(
                            roster.record(&promoted).unwrap().status,
                            AttendanceStatus::Booked
                        );
                    }
                }
                Op::Process => {
                    let free_before = waitlist::free_seats(&roster, capacity);
                    let promoted = waitlist::fill_open_seats(&mut roster, capacity, now);
                    prop_assert!(u32::try_from(promoted.len()).unwrap() <= free_before);
                    if free_before == 0 {
                        prop_assert!(promoted.is_empty());
                    }
                }
            }

            if !forced {
                prop_assert!(roster.active_count() <= capacity);
            }
            // A live record per member is guaranteed by the map key; a
            // waiting member next to an idle seat is not
            if roster.waitlist_len() > 0 && !forced {
                prop_assert_eq!(waitlist::free_seats(&roster, capacity), 0);
            }
        }
    }

    #[test]
    fn every_balance_change_has_one_matching_entry(
        start in 0..20i64,
        amounts in prop::collection::vec(-10..10i64, 1..40),
    ) {
        let mut member = fixtures::member("alice", start);
        let mut logged = 0i64;

        for amount in amounts {
            let before = member.class_credits;
            let change = CreditChange {
                amount,
                kind: CreditLogKind::AdminAdjustment,
                description: "adjustment".to_string(),
                actor: Actor::Admin("owner".to_string()),
                gym_id: None,
            };
            match ledger::apply(&mut member, change, fixtures::epoch()) {
                Ok(entry) => {
                    prop_assert_eq!(entry.amount, amount);
                    prop_assert_eq!(member.class_credits - before, entry.amount);
                    logged += entry.amount;
                }
                Err(_) => prop_assert_eq!(member.class_credits, before),
            }
            prop_assert!(member.class_credits >= 0);
        }

        prop_assert_eq!(member.class_credits, start + logged);
    }
}
