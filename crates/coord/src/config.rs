// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration.

use cix_core::AgentId;
use std::time::Duration;

/// Default root under which agent membership nodes live
pub const DEFAULT_ROOT: &str = "/cix/agents";

/// Suffix of an agent's exclusive-claim node
pub const LOCK_SUFFIX: &str = "-lock";

/// Settings for talking to the coordination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordConfig {
    pub root: String,
    /// How long a session survives without a keep-alive
    pub session_ttl: Duration,
    /// Upper bound on a single coordination call
    pub op_timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            session_ttl: Duration::from_secs(10),
            op_timeout: Duration::from_secs(5),
            retries: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

impl CoordConfig {
    cix_core::setters! {
        into { root: String }
        set { session_ttl: Duration, op_timeout: Duration, retries: u32, retry_delay: Duration }
    }

    /// Keep-alive period: a third of the session TTL
    pub fn heartbeat_interval(&self) -> Duration {
        self.session_ttl / 3
    }

    pub fn agent_path(&self, id: &AgentId) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), id)
    }

    pub fn lock_path(&self, id: &AgentId) -> String {
        format!("{}{}", self.agent_path(id), LOCK_SUFFIX)
    }

    /// Agent id for a membership node path, `None` for lock nodes and
    /// anything outside the root.
    pub fn agent_of(&self, path: &str) -> Option<AgentId> {
        let name = path.strip_prefix(self.root.trim_end_matches('/'))?.strip_prefix('/')?;
        membership_name(name).map(AgentId::from)
    }
}

/// Child names that are membership nodes (not locks, not nested)
pub(crate) fn membership_name(name: &str) -> Option<&str> {
    if name.is_empty() || name.contains('/') || name.ends_with(LOCK_SUFFIX) {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
