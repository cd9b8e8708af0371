// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status ordering specs
//!
//! Reports about one command may arrive in any order; the stored record
//! only ever moves forward.

use crate::prelude::*;

fn report(status: Status, code: Option<i32>) -> ExecutedCmd {
    let mut executed = executed_with("c1", status);
    executed.code = code;
    executed
}

#[test]
fn late_running_report_does_not_reopen_a_finished_command() {
    let store = MemoryCmdStore::new();
    store.save_executed(report(Status::Executed, Some(0))).unwrap();
    let stored = store.save_executed(report(Status::Running, None)).unwrap();

    similar_asserts::assert_eq!(stored, report(Status::Executed, Some(0)));
}

#[test]
fn timeout_overrides_a_racing_exit() {
    let store = MemoryCmdStore::new();
    store.save_executed(report(Status::Executed, Some(137))).unwrap();
    let stored = store.save_executed(report(Status::TimeoutKill, Some(cix_core::CODE_TIMEOUT))).unwrap();

    assert_eq!(stored.status(), Status::TimeoutKill);
    assert_eq!(stored.code, Some(cix_core::CODE_TIMEOUT));
}

#[test]
fn same_level_takes_the_newer_report() {
    let store = MemoryCmdStore::new();
    store.save_executed(report(Status::Killed, None)).unwrap();
    let stored = store.save_executed(report(Status::Exception, None)).unwrap();
    assert_eq!(stored.status(), Status::Exception);
}

#[test]
fn every_arrival_order_ends_at_the_highest_level() {
    let statuses = [Status::Pending, Status::Running, Status::Executed, Status::Killed];
    // All 24 permutations of four reports
    let mut orders = vec![Vec::new()];
    for _ in 0..statuses.len() {
        orders = orders
            .into_iter()
            .flat_map(|order: Vec<Status>| {
                statuses
                    .iter()
                    .filter(|s| !order.contains(s))
                    .map(|s| {
                        let mut next = order.clone();
                        next.push(*s);
                        next
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
    }
    assert_eq!(orders.len(), 24);

    for order in orders {
        let store = MemoryCmdStore::new();
        for status in &order {
            store.save_executed(report(*status, None)).unwrap();
        }
        let stored = store.get_executed(&CmdId::from("c1")).unwrap().unwrap();
        assert_eq!(stored.status(), Status::Killed, "arrival order {order:?}");
    }
}
