// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's standing in the pool.
//!
//! The engine reports when a command takes the slot and when it frees it.
//! In a pool that flips the membership status and hands the claim back, so
//! a dispatcher can claim the agent again.

use async_trait::async_trait;
use cix_coord::{AgentCoordinator, CoordError, Coordination};
use cix_core::{AgentId, AgentStatus, CmdId};
use tokio::sync::Mutex;

/// Receives slot transitions from the engine.
#[async_trait]
pub trait Presence: Send + Sync + 'static {
    /// `cmd_id` took the slot.
    async fn busy(&self, cmd_id: &CmdId);

    /// `cmd_id` left the slot, finished or killed.
    async fn idle(&self, cmd_id: &CmdId);
}

/// Agent outside any pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standalone;

#[async_trait]
impl Presence for Standalone {
    async fn busy(&self, _cmd_id: &CmdId) {}

    async fn idle(&self, _cmd_id: &CmdId) {}
}

/// Membership of a registered agent.
pub struct PoolPresence<S: Coordination> {
    coordinator: AgentCoordinator<S>,
    agent_id: AgentId,
    /// Command the last `BUSY` was written for
    running: Mutex<Option<CmdId>>,
}

impl<S: Coordination> PoolPresence<S> {
    /// Register `agent_id` as an idle member.
    pub async fn join(
        coordinator: AgentCoordinator<S>,
        agent_id: AgentId,
        address: Option<String>,
    ) -> Result<Self, CoordError> {
        coordinator.register(&agent_id, address).await?;
        Ok(Self { coordinator, agent_id, running: Mutex::new(None) })
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }
}

#[async_trait]
impl<S: Coordination> Presence for PoolPresence<S> {
    async fn busy(&self, cmd_id: &CmdId) {
        let mut running = self.running.lock().await;
        *running = Some(cmd_id.clone());
        if let Err(e) = self.coordinator.set_status(&self.agent_id, AgentStatus::Busy).await {
            tracing::warn!(agent_id = %self.agent_id, %cmd_id, error = %e, "cannot mark agent busy");
        }
    }

    async fn idle(&self, cmd_id: &CmdId) {
        let mut running = self.running.lock().await;
        if running.as_ref() != Some(cmd_id) {
            tracing::debug!(agent_id = %self.agent_id, %cmd_id, "slot already taken by a newer command");
            return;
        }
        *running = None;
        match self.coordinator.idle_and_release(&self.agent_id).await {
            Ok(()) => tracing::info!(agent_id = %self.agent_id, %cmd_id, "agent back in the pool"),
            Err(e) => {
                tracing::warn!(agent_id = %self.agent_id, %cmd_id, error = %e, "cannot return agent to the pool")
            }
        }
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
