// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent status notifications.

use crate::coordination::Coordination;
use crate::coordinator::{AgentCoordinator, StatusChangeEvent};
use cix_core::{AgentId, AgentStatus};
use std::collections::{BTreeSet, VecDeque};
use tokio::sync::broadcast::{self, error::RecvError};

/// Lazy, unbounded sequence of agent status changes.
///
/// Every node notification re-reads the agent's current status, so a
/// subscriber that falls behind sees the latest value rather than every
/// intermediate one. Delivery is at-least-once: the same status may be
/// reported more than once.
pub struct StatusWatch<S: Coordination> {
    coordinator: AgentCoordinator<S>,
    filter: Option<AgentId>,
    events: broadcast::Receiver<crate::lease::NodeEvent>,
    pending: VecDeque<StatusChangeEvent>,
    /// Agents reported so far; used to spot removals missed while lagging
    seen: BTreeSet<AgentId>,
}

impl<S: Coordination> StatusWatch<S> {
    pub(crate) fn new(coordinator: AgentCoordinator<S>, filter: Option<AgentId>) -> Self {
        let events = coordinator.session().subscribe();
        Self { coordinator, filter, events, pending: VecDeque::new(), seen: BTreeSet::new() }
    }

    /// Next status change; `None` once the coordination service is gone.
    pub async fn next(&mut self) -> Option<StatusChangeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.events.recv().await {
                Ok(event) => {
                    let Some(agent_id) = self.coordinator.config().agent_of(&event.path) else {
                        continue;
                    };
                    if self.filter.as_ref().is_some_and(|f| *f != agent_id) {
                        continue;
                    }
                    tracing::trace!(%agent_id, kind = %event.kind, "membership event");
                    let status = self.read_status(&agent_id).await;
                    self.seen.insert(agent_id.clone());
                    return Some(StatusChangeEvent { agent_id, status });
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "status watch lagged, re-reading agents");
                    self.resync().await;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Status of one agent, `OFFLINE` when it cannot be read.
    async fn read_status(&self, agent_id: &AgentId) -> AgentStatus {
        match self.coordinator.get(agent_id).await {
            Ok(agent) => agent.status,
            Err(e) => {
                tracing::warn!(%agent_id, error = %e, "status read failed, reporting offline");
                AgentStatus::Offline
            }
        }
    }

    /// Queue the current status of every watched agent.
    async fn resync(&mut self) {
        let mut ids: BTreeSet<AgentId> = match &self.filter {
            Some(id) => BTreeSet::from([id.clone()]),
            None => match self.coordinator.agent_ids().await {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "agent listing failed during resync");
                    BTreeSet::new()
                }
            },
        };
        // Agents that disappeared while we were behind
        ids.extend(self.seen.iter().cloned());

        for agent_id in ids {
            let status = self.read_status(&agent_id).await;
            self.seen.insert(agent_id.clone());
            self.pending.push_back(StatusChangeEvent { agent_id, status });
        }
    }
}
