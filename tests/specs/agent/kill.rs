// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight specs
//!
//! One command at a time; KILL and CLOSE free the agent immediately.

use crate::prelude::*;

#[tokio::test]
async fn second_command_is_rejected_while_busy() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("long", &["echo up", "sleep 30"])).await.unwrap();
    agent.until_logged("long", "up").await;

    let dispatch = agent.engine.execute(shell_cmd("short", &["echo hi"])).await.unwrap();
    assert!(matches!(dispatch, Dispatch::Rejected { .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    agent.drain();
    assert!(agent.about(&CmdId::from("short")).is_empty());
    assert!(agent.engine.get(&CmdId::from("short")).is_err());

    agent.engine.kill().await.unwrap();
}

#[tokio::test]
async fn kill_reports_killed_once_and_frees_the_agent() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("long", &["echo up", "sleep 30"])).await.unwrap();
    agent.until_logged("long", "up").await;

    let dispatch = agent.engine.execute(Cmd::kill()).await.unwrap();
    assert_eq!(dispatch, Dispatch::Killed(Some(CmdId::from("long"))));
    assert_eq!(agent.engine.current(), None);

    let traffic = agent.until_completed("long").await;
    let BusMessage::Completed(done) = &traffic[traffic.len() - 1].message else {
        panic!("expected completion");
    };
    assert_eq!(done.status(), Status::Killed);

    let dispatch = agent.engine.execute(shell_cmd("next", &["echo again"])).await.unwrap();
    assert_eq!(dispatch, Dispatch::Accepted(CmdId::from("next")));
    agent.until_completed("next").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    agent.drain();
    let completions = agent
        .about(&CmdId::from("long"))
        .into_iter()
        .filter(|e| matches!(e.message, BusMessage::Completed(_)))
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn timeout_is_reported_with_its_own_status() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("slow", &["sleep 30"]).timeout(1u64)).await.unwrap();

    let traffic = agent.until_completed("slow").await;
    let BusMessage::Completed(done) = &traffic[traffic.len() - 1].message else {
        panic!("expected completion");
    };
    assert_eq!(done.status(), Status::TimeoutKill);
    assert_eq!(done.code, Some(cix_core::CODE_TIMEOUT));
}

#[tokio::test]
async fn close_stops_the_agent_with_configured_code() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("long", &["echo up", "sleep 30"])).await.unwrap();
    agent.until_logged("long", "up").await;

    let closed = tokio::spawn({
        let engine = agent.engine.clone();
        async move { engine.closed().await }
    });
    assert_eq!(agent.engine.execute(Cmd::close()).await.unwrap(), Dispatch::Closing(42));
    assert_eq!(tokio::time::timeout(SPEC_WAIT, closed).await.unwrap().unwrap(), 42);

    let traffic = agent.until_completed("long").await;
    assert!(matches!(
        &traffic[traffic.len() - 1].message,
        BusMessage::Completed(done) if done.status() == Status::Killed
    ));
}
