// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and availability.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier of an execution agent.
    ///
    /// Also the name of the agent's membership node, so it must not contain `/`.
    pub struct AgentId("agt-");
}

/// Availability of an agent as seen by the coordinator.
///
/// `Offline` is never written by an agent: it is what a missing membership
/// node means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Offline,
    Idle,
    Busy,
}

crate::simple_display! {
    AgentStatus {
        Offline => "OFFLINE",
        Idle => "IDLE",
        Busy => "BUSY",
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown agent status: {0}")]
pub struct ParseAgentStatusError(pub String);

impl FromStr for AgentStatus {
    type Err = ParseAgentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFFLINE" => Ok(AgentStatus::Offline),
            "IDLE" => Ok(AgentStatus::Idle),
            "BUSY" => Ok(AgentStatus::Busy),
            _ => Err(ParseAgentStatusError(s.to_string())),
        }
    }
}

/// An execution agent known to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Network address the agent advertised when registering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub status: AgentStatus,
}

impl Agent {
    /// An agent with no membership node.
    pub fn offline(id: AgentId) -> Self {
        Self { id, address: None, status: AgentStatus::Offline }
    }

    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Idle
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
