// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Barrier;

fn id(s: &str) -> CmdId {
    CmdId::from(s)
}

#[test]
fn second_occupant_is_refused() {
    let slot = Slot::new();
    let ticket = slot.try_occupy(&id("a")).unwrap();
    assert!(slot.try_occupy(&id("b")).is_none());
    assert_eq!(slot.current(), Some(id("a")));

    assert!(slot.clear_if(ticket.generation));
    assert!(slot.is_free());
    assert!(slot.try_occupy(&id("b")).is_some());
}

#[test]
fn stale_generation_cannot_clear() {
    let slot = Slot::new();
    let first = slot.try_occupy(&id("a")).unwrap();
    let taken = slot.take().unwrap();
    assert_eq!(taken.generation, first.generation);
    assert!(!taken.is_started());

    let second = slot.try_occupy(&id("b")).unwrap();
    assert!(second.generation > first.generation);
    assert!(!slot.clear_if(first.generation));
    assert_eq!(slot.current(), Some(id("b")));
}

#[tokio::test]
async fn start_fails_after_take() {
    let slot = Slot::new();
    let ticket = slot.try_occupy(&id("a")).unwrap();
    slot.take();

    let task = tokio::spawn(std::future::pending::<()>());
    assert!(!slot.start(ticket.generation, task.abort_handle()));
    task.abort();
}

#[tokio::test]
async fn take_aborts_started_worker() {
    let slot = Slot::new();
    let ticket = slot.try_occupy(&id("a")).unwrap();
    let task = tokio::spawn(std::future::pending::<()>());
    assert!(slot.start(ticket.generation, task.abort_handle()));

    let occupant = slot.take().unwrap();
    assert!(occupant.is_started());
    occupant.abort();
    assert!(task.await.unwrap_err().is_cancelled());
}

#[test]
fn progress_tracks_pid_and_lines() {
    let progress = Progress::default();
    assert_eq!(progress.pid(), None);
    progress.set_pid(42);
    progress.add_line();
    progress.add_line();
    assert_eq!(progress.pid(), Some(42));
    assert_eq!(progress.lines(), 2);
}

#[test]
fn concurrent_occupation_has_one_winner() {
    let slot = Arc::new(Slot::new());
    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let slot = Arc::clone(&slot);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                slot.try_occupy(&CmdId::from(format!("c{i}"))).is_some()
            })
        })
        .collect();
    let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
    assert_eq!(winners, 1);
}

#[derive(Debug, Clone)]
enum Op {
    Occupy,
    ClearLatest,
    ClearStale,
    Take,
}

fn arb_op() -> impl proptest::strategy::Strategy<Value = Op> {
    use proptest::prelude::*;
    prop_oneof![Just(Op::Occupy), Just(Op::ClearLatest), Just(Op::ClearStale), Just(Op::Take)]
}

proptest::proptest! {
    #[test]
    fn slot_holds_at_most_the_latest_occupant(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let slot = Slot::new();
        let mut latest: Option<u64> = None;
        let mut occupied = false;

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Occupy => {
                    let ticket = slot.try_occupy(&CmdId::from(format!("c{n}")));
                    proptest::prop_assert_eq!(ticket.is_some(), !occupied);
                    if let Some(ticket) = ticket {
                        proptest::prop_assert!(latest.map_or(true, |g| ticket.generation > g));
                        latest = Some(ticket.generation);
                        occupied = true;
                    }
                }
                Op::ClearLatest => {
                    let cleared = latest.is_some_and(|g| slot.clear_if(g));
                    proptest::prop_assert_eq!(cleared, occupied);
                    occupied = false;
                }
                Op::ClearStale => {
                    if let Some(g) = latest.filter(|g| *g > 1) {
                        proptest::prop_assert!(!slot.clear_if(g - 1));
                    }
                }
                Op::Take => {
                    proptest::prop_assert_eq!(slot.take().is_some(), occupied);
                    occupied = false;
                }
            }
            proptest::prop_assert_eq!(slot.is_free(), !occupied);
        }
    }
}
