// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent pool specs
//!
//! Dispatchers claim idle agents exclusively, hand them a command and give
//! them back once it completed; the agent returns its own claim when the
//! command leaves the slot. A lapsed agent session reads as offline.

use crate::prelude::*;
use cix_agent::PoolPresence;
use cix_coord::{AgentCoordinator, Claim, CoordConfig, LeaseSession, LeaseStore};
use cix_core::{AgentId, AgentStatus, FakeClock};

const TTL: Duration = Duration::from_secs(10);
const LONG_TTL: Duration = Duration::from_secs(3600);

fn config() -> CoordConfig {
    CoordConfig::default().session_ttl(TTL).retries(1).retry_delay(Duration::from_millis(1))
}

fn member(store: &LeaseStore<FakeClock>, ttl: Duration) -> AgentCoordinator<LeaseSession<FakeClock>> {
    AgentCoordinator::new(store.connect(ttl).unwrap(), config())
}

/// Keep trying until the agent can be claimed again.
async fn until_claimed(dispatcher: &AgentCoordinator<LeaseSession<FakeClock>>, agent_id: &AgentId) -> Claim {
    tokio::time::timeout(SPEC_WAIT, async {
        loop {
            if let Some(claim) = dispatcher.claim_any(std::slice::from_ref(agent_id)).await.unwrap() {
                return claim;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn claimed_agent_runs_one_command_then_returns_to_idle() {
    let store = LeaseStore::new(FakeClock::new());
    let agent_id = AgentId::from("agent-1");
    let presence =
        PoolPresence::join(member(&store, LONG_TTL), agent_id.clone(), Some("10.0.0.7:7000".to_string()))
            .await
            .unwrap();
    let mut agent = AgentHarness::in_pool(Arc::new(presence));

    let dispatcher = member(&store, LONG_TTL);
    let rival = member(&store, LONG_TTL);
    let claim = dispatcher.claim_any(&[agent_id.clone()]).await.unwrap().unwrap();
    assert_eq!(dispatcher.get(&agent_id).await.unwrap().status, AgentStatus::Busy);
    assert_eq!(rival.claim_any(&[agent_id.clone()]).await.unwrap(), None);

    agent.engine.execute(shell_cmd("job-1", &["echo compiled"])).await.unwrap();
    let traffic = agent.until_completed("job-1").await;
    assert_eq!(kinds(&traffic).last().map(String::as_str), Some("completed"));

    // The agent gives itself back; the dispatcher does nothing
    let next = until_claimed(&rival, &agent_id).await;
    assert_eq!(rival.get(&agent_id).await.unwrap().address.as_deref(), Some("10.0.0.7:7000"));

    // A late release from the first dispatcher leaves the new claim alone
    dispatcher.release_and_idle(&claim).await.unwrap();
    assert_eq!(dispatcher.get(&agent_id).await.unwrap().status, AgentStatus::Busy);
    assert_eq!(dispatcher.try_claim(&agent_id).await.unwrap(), None);
    assert!(rival.release(&next).await.unwrap());
}

#[tokio::test]
async fn killed_command_also_returns_the_agent() {
    let store = LeaseStore::new(FakeClock::new());
    let agent_id = AgentId::from("agent-3");
    let presence = PoolPresence::join(member(&store, LONG_TTL), agent_id.clone(), None).await.unwrap();
    let mut agent = AgentHarness::in_pool(Arc::new(presence));

    let dispatcher = member(&store, LONG_TTL);
    dispatcher.claim_any(&[agent_id.clone()]).await.unwrap().unwrap();
    agent.engine.execute(shell_cmd("long", &["echo up", "sleep 30"])).await.unwrap();
    agent.until_logged("long", "up").await;
    assert_eq!(dispatcher.get(&agent_id).await.unwrap().status, AgentStatus::Busy);

    agent.engine.execute(Cmd::kill()).await.unwrap();
    let rival = member(&store, LONG_TTL);
    let next = until_claimed(&rival, &agent_id).await;
    assert_eq!(next.agent_id, agent_id);
}

#[tokio::test]
async fn lapsed_agent_is_offline_and_watchers_hear_about_it() {
    let clock = FakeClock::new();
    let store = LeaseStore::new(clock.clone());
    let agent_id = AgentId::from("agent-2");

    let dispatcher = member(&store, LONG_TTL);
    let mut watch = dispatcher.watch(Some(agent_id.clone()));

    member(&store, TTL).register(&agent_id, None).await.unwrap();
    let event = tokio::time::timeout(SPEC_WAIT, watch.next()).await.unwrap().unwrap();
    assert_eq!(event.status, AgentStatus::Idle);

    clock.advance(TTL + Duration::from_secs(1));
    store.tick();
    let event = tokio::time::timeout(SPEC_WAIT, watch.next()).await.unwrap().unwrap();
    assert_eq!(event.agent_id, agent_id);
    assert_eq!(event.status, AgentStatus::Offline);

    assert_eq!(dispatcher.get(&agent_id).await.unwrap().status, AgentStatus::Offline);
    assert!(dispatcher.list().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_dispatchers_split_the_pool() {
    let store = LeaseStore::new(FakeClock::new());
    let ids: Vec<AgentId> = (0..3).map(|i| AgentId::from(format!("agent-{i}"))).collect();
    for id in &ids {
        member(&store, LONG_TTL).register(id, None).await.unwrap();
    }

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let dispatcher = member(&store, LONG_TTL);
            let ids = ids.clone();
            tokio::spawn(async move { dispatcher.claim_any(&ids).await })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(claim) = handle.await.unwrap().unwrap() {
            claimed.push(claim.agent_id);
        }
    }
    claimed.sort();
    assert_eq!(claimed, ids);
}
