// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch specs
//!
//! A SHELL command goes through received, started, its log lines and one
//! completion report, each on the right bus destination.

use crate::prelude::*;

#[tokio::test]
async fn exported_variable_comes_back_as_output() {
    let mut agent = AgentHarness::start();
    let cmd = shell_cmd("build-1", &["echo building", "export X=1"])
        .env_filters(vec!["X".to_string()]);

    let dispatch = agent.engine.on_cmd_received(cmd).await.unwrap();
    assert_eq!(dispatch, Dispatch::Accepted(CmdId::from("build-1")));

    let traffic = agent.until_completed("build-1").await;
    assert_eq!(kinds(&traffic), vec!["received", "started", "log", "completed"]);

    let destinations: Vec<&str> = traffic.iter().map(|e| e.destination.as_str()).collect();
    assert_eq!(destinations, vec![CALLBACK_QUEUE, CALLBACK_QUEUE, LOGS_EXCHANGE, CALLBACK_QUEUE]);

    let BusMessage::Completed(done) = &traffic[3].message else {
        panic!("last message should be the completion: {:?}", traffic[3]);
    };
    assert_eq!(done.status(), Status::Executed);
    assert_eq!(done.code, Some(0));
    assert_eq!(done.output.get("X").map(String::as_str), Some("1"));
    assert_eq!(done.log_size, 1);
}

#[tokio::test]
async fn completion_wire_shape() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("c1", &["echo hi"])).await.unwrap();
    let traffic = agent.until_completed("c1").await;

    let log = serde_json::to_value(&traffic[2]).unwrap();
    assert_eq!(log["destination"], LOGS_EXCHANGE);
    assert_eq!(log["message"]["kind"], "log");
    assert_eq!(log["message"]["payload"]["commandId"], "c1");
    assert_eq!(log["message"]["payload"]["content"], "hi");

    let completed = serde_json::to_value(&traffic[3]).unwrap();
    assert_eq!(completed["message"]["kind"], "completed");
    assert_eq!(completed["message"]["payload"]["status"], "EXECUTED");
    assert_eq!(completed["message"]["payload"]["code"], 0);
}

#[tokio::test]
async fn unresolvable_plugin_is_an_exception_without_a_process() {
    let mut agent = AgentHarness::start();
    let cmd = shell_cmd("lint-1", &["echo unreachable"]).plugin(PluginRef::new("lint", "2.0"));
    agent.engine.execute(cmd).await.unwrap();

    let traffic = agent.until_completed("lint-1").await;
    assert_eq!(kinds(&traffic), vec!["received", "completed"]);
    let BusMessage::Completed(done) = &traffic[1].message else {
        panic!("expected completion");
    };
    assert_eq!(done.status(), Status::Exception);
    assert_eq!(done.process_id, None);
    assert!(done.error.as_deref().unwrap_or_default().contains("lint@2.0"));
    assert_eq!(agent.engine.current(), None);
}

#[tokio::test]
async fn commands_run_in_the_workspace() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("c1", &["echo data > out.txt"])).await.unwrap();
    agent.until_completed("c1").await;

    let written = std::fs::read_to_string(agent.workspace().join("out.txt")).unwrap();
    assert_eq!(written, "data\n");
}

#[tokio::test]
async fn failing_script_stops_at_first_error() {
    let mut agent = AgentHarness::start();
    agent.engine.execute(shell_cmd("c1", &["echo one", "false", "echo two"])).await.unwrap();

    let traffic = agent.until_completed("c1").await;
    let lines: Vec<String> = traffic
        .iter()
        .filter_map(|e| match &e.message {
            BusMessage::Log(line) => Some(line.content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec!["one".to_string()]);

    let done = agent.engine.executed(&CmdId::from("c1")).unwrap();
    assert_eq!(done.status(), Status::Executed);
    assert_eq!(done.code, Some(1));

    let page = agent.engine.logs(&CmdId::from("c1"), 0, 10).await.unwrap();
    assert_eq!(page.items, vec!["one".to_string()]);
}
