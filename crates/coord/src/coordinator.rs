// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent membership, availability and exclusive claims.
//!
//! Each agent registers an ephemeral membership node at `{root}/{agent_id}`
//! whose JSON payload carries its status. A dispatcher claims an agent by
//! creating `{root}/{agent_id}-lock` under its own session; whoever creates
//! it first owns the agent until it releases the lock or its session ends.
//!
//! A lock created before the agent's current membership node belongs to a
//! previous incarnation of the agent and is taken over.

use crate::config::{membership_name, CoordConfig};
use crate::coordination::Coordination;
use crate::error::{CoordError, LeaseError};
use crate::lease::CreateMode;
use crate::watch::StatusWatch;
use cix_core::{Agent, AgentId, AgentStatus};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Data stored on a membership node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MembershipPayload {
    status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

impl MembershipPayload {
    /// Unreadable data on a live node counts as an idle agent with no address.
    fn decode(agent_id: &AgentId, data: &[u8]) -> Self {
        serde_json::from_slice(data).unwrap_or_else(|e| {
            tracing::debug!(%agent_id, error = %e, "unreadable membership payload");
            Self { status: AgentStatus::Idle, address: None }
        })
    }
}

/// A registered agent's membership node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub agent_id: AgentId,
    pub path: String,
    /// Creation sequence of the node
    pub czxid: u64,
}

/// Exclusive claim on one agent, held until released or the claimer's
/// session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub agent_id: AgentId,
    pub path: String,
    czxid: u64,
}

/// A change in one agent's observed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeEvent {
    pub agent_id: AgentId,
    pub status: AgentStatus,
}

/// Coordinator-side view of the agent pool, bound to one session.
#[derive(Clone)]
pub struct AgentCoordinator<S: Coordination> {
    session: S,
    config: CoordConfig,
}

impl<S: Coordination> AgentCoordinator<S> {
    pub fn new(session: S, config: CoordConfig) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &CoordConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Run one coordination call under the op timeout, retrying transient
    /// failures `retries` times.
    async fn call<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, CoordError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LeaseError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = tokio::time::timeout(self.config.op_timeout, f())
                .await
                .unwrap_or(Err(LeaseError::Timeout));
            match result {
                Err(e) if e.is_transient() && attempts <= self.config.retries => {
                    tracing::warn!(op, attempts, error = %e, "coordination call failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(CoordError::CoordinationUnavailable { op, attempts, source: e });
                }
                other => return other.map_err(CoordError::from),
            }
        }
    }

    /// Announce `agent_id` as an `IDLE` member of the pool.
    ///
    /// A membership left by an expired session is gone by the time this runs;
    /// one held by another live session fails with `AlreadyRegistered`.
    pub async fn register(
        &self,
        agent_id: &AgentId,
        address: Option<String>,
    ) -> Result<Membership, CoordError> {
        let path = self.config.agent_path(agent_id);
        let data = serde_json::to_vec(&MembershipPayload { status: AgentStatus::Idle, address })?;
        let own = self.session.session_id();

        for _ in 0..=self.config.retries {
            let created = self
                .call("register", || self.session.create(&path, data.clone(), CreateMode::Ephemeral))
                .await;
            let existing = match created {
                Ok(stat) => {
                    tracing::info!(%agent_id, czxid = stat.czxid, "agent registered");
                    return Ok(Membership { agent_id: agent_id.clone(), path, czxid: stat.czxid });
                }
                Err(CoordError::Lease(LeaseError::NodeExists(_))) => {
                    self.call("register", || self.session.get(&path)).await?
                }
                Err(e) => return Err(e),
            };
            let Some((_, stat)) = existing else { continue };
            match stat.ephemeral_owner {
                Some(owner) if owner == own => {
                    let stat = self.call("register", || self.session.set(&path, data.clone(), None)).await?;
                    tracing::info!(%agent_id, "agent re-registered");
                    return Ok(Membership { agent_id: agent_id.clone(), path, czxid: stat.czxid });
                }
                Some(owner) => {
                    tracing::warn!(%agent_id, session = %owner, "agent registered by another session");
                    return Err(CoordError::AlreadyRegistered(agent_id.clone()));
                }
                None => {
                    tracing::warn!(%agent_id, "removing persistent membership node");
                    match self.call("register", || self.session.delete(&path, Some(stat.version))).await
                    {
                        Ok(()) | Err(CoordError::Lease(LeaseError::NoNode(_))) => {}
                        Err(CoordError::Lease(LeaseError::BadVersion { .. })) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Err(CoordError::AlreadyRegistered(agent_id.clone()))
    }

    /// Write the agent's status payload. Does nothing if the agent is not
    /// registered.
    pub async fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<(), CoordError> {
        let path = self.config.agent_path(agent_id);
        for attempt in 0..=self.config.retries {
            let Some((data, stat)) = self.call("set_status", || self.session.get(&path)).await? else {
                tracing::debug!(%agent_id, %status, "set_status on unregistered agent");
                return Ok(());
            };
            let mut payload = MembershipPayload::decode(agent_id, &data);
            payload.status = status;
            let data = serde_json::to_vec(&payload)?;
            // Last attempt writes unconditionally
            let expected = (attempt < self.config.retries).then_some(stat.version);
            match self.call("set_status", || self.session.set(&path, data.clone(), expected)).await {
                Ok(_) => {
                    tracing::debug!(%agent_id, %status, "agent status written");
                    return Ok(());
                }
                Err(CoordError::Lease(LeaseError::BadVersion { .. })) => continue,
                Err(CoordError::Lease(LeaseError::NoNode(_))) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Try to take the agent's exclusive claim.
    ///
    /// `Ok(None)` means someone else holds it. Fails with `NotFound` when the
    /// agent has no live membership.
    pub async fn try_claim(&self, agent_id: &AgentId) -> Result<Option<Claim>, CoordError> {
        let member_path = self.config.agent_path(agent_id);
        let lock_path = self.config.lock_path(agent_id);
        let lock_data = self.session.session_id().to_string().into_bytes();

        for _ in 0..=self.config.retries {
            let Some((_, member)) = self.call("try_claim", || self.session.get(&member_path)).await?
            else {
                return Err(CoordError::NotFound(agent_id.clone()));
            };

            let created = self
                .call("try_claim", || {
                    self.session.create(&lock_path, lock_data.clone(), CreateMode::Ephemeral)
                })
                .await;
            match created {
                Ok(stat) => {
                    tracing::info!(%agent_id, czxid = stat.czxid, "agent claimed");
                    return Ok(Some(Claim {
                        agent_id: agent_id.clone(),
                        path: lock_path,
                        czxid: stat.czxid,
                    }));
                }
                Err(CoordError::Lease(LeaseError::NodeExists(_))) => {}
                Err(e) => return Err(e),
            }

            let Some((_, lock)) = self.call("try_claim", || self.session.get(&lock_path)).await?
            else {
                continue;
            };
            if lock.czxid > member.czxid {
                tracing::debug!(%agent_id, "agent already claimed");
                return Ok(None);
            }

            tracing::info!(%agent_id, "taking over claim from a previous membership");
            match self.call("try_claim", || self.session.delete(&lock_path, Some(lock.version))).await {
                Ok(()) => {}
                Err(CoordError::Lease(LeaseError::NoNode(_) | LeaseError::BadVersion { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        Err(CoordError::ClaimConflict(agent_id.clone()))
    }

    /// Give up a claim. Deletes only the lock node this claim created;
    /// returns whether it was still there.
    pub async fn release(&self, claim: &Claim) -> Result<bool, CoordError> {
        let Some((_, stat)) = self.call("release", || self.session.get(&claim.path)).await? else {
            return Ok(false);
        };
        if stat.czxid != claim.czxid {
            tracing::debug!(agent_id = %claim.agent_id, "claim already superseded");
            return Ok(false);
        }
        match self.call("release", || self.session.delete(&claim.path, Some(stat.version))).await {
            Ok(()) => {
                tracing::info!(agent_id = %claim.agent_id, "claim released");
                Ok(true)
            }
            Err(CoordError::Lease(LeaseError::NoNode(_) | LeaseError::BadVersion { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Drop whatever claim is held on `agent_id`, from the agent's side.
    pub async fn release_agent(&self, agent_id: &AgentId) -> Result<(), CoordError> {
        let path = self.config.lock_path(agent_id);
        let Some((_, stat)) = self.call("release_agent", || self.session.get(&path)).await? else {
            return Ok(());
        };
        match self.call("release_agent", || self.session.delete(&path, Some(stat.version))).await {
            Ok(()) => {
                tracing::info!(%agent_id, "claim given back by agent");
                Ok(())
            }
            Err(CoordError::Lease(LeaseError::NoNode(_) | LeaseError::BadVersion { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Current view of one agent; `OFFLINE` without a live membership.
    pub async fn get(&self, agent_id: &AgentId) -> Result<Agent, CoordError> {
        let path = self.config.agent_path(agent_id);
        Ok(match self.call("get", || self.session.get(&path)).await? {
            Some((data, _)) => {
                let payload = MembershipPayload::decode(agent_id, &data);
                Agent { id: agent_id.clone(), address: payload.address, status: payload.status }
            }
            None => Agent::offline(agent_id.clone()),
        })
    }

    /// Ids of all registered agents.
    pub async fn agent_ids(&self) -> Result<Vec<AgentId>, CoordError> {
        let root = self.config.root.trim_end_matches('/');
        let children = self.call("list", || self.session.children(root)).await?;
        Ok(children.iter().filter_map(|name| membership_name(name)).map(AgentId::from).collect())
    }

    /// All registered agents.
    pub async fn list(&self) -> Result<Vec<Agent>, CoordError> {
        let mut agents = Vec::new();
        for id in self.agent_ids().await? {
            agents.push(self.get(&id).await?);
        }
        Ok(agents)
    }

    /// Stream of status changes for one agent or, with `None`, all of them.
    pub fn watch(&self, agent_id: Option<AgentId>) -> StatusWatch<S> {
        StatusWatch::new(self.clone(), agent_id)
    }

    /// Claim the first idle agent among `candidates` and mark it `BUSY`.
    ///
    /// Agents that are busy, claimed or gone are skipped.
    pub async fn claim_any(&self, candidates: &[AgentId]) -> Result<Option<Claim>, CoordError> {
        for agent_id in candidates {
            if self.get(agent_id).await?.status != AgentStatus::Idle {
                continue;
            }
            match self.try_claim(agent_id).await {
                Ok(Some(claim)) => {
                    self.set_status(agent_id, AgentStatus::Busy).await?;
                    return Ok(Some(claim));
                }
                Ok(None) | Err(CoordError::NotFound(_)) => {}
                Err(CoordError::ClaimConflict(_)) => {
                    tracing::warn!(%agent_id, "claim conflict, trying next agent");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Agent-side counterpart of [`Self::release_and_idle`]: mark the agent
    /// `IDLE`, then drop the claim on it. The lock outlives the `BUSY`
    /// status, never the other way round.
    pub async fn idle_and_release(&self, agent_id: &AgentId) -> Result<(), CoordError> {
        self.set_status(agent_id, AgentStatus::Idle).await?;
        self.release_agent(agent_id).await
    }

    /// Release a claim after its job finished and mark the agent `IDLE`.
    /// A claim that is already gone leaves the status to its successor.
    pub async fn release_and_idle(&self, claim: &Claim) -> Result<(), CoordError> {
        if self.release(claim).await? {
            self.set_status(&claim.agent_id, AgentStatus::Idle).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
