// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination errors.

use crate::lease::SessionId;
use cix_core::AgentId;
use thiserror::Error;

/// Errors from the lease store and its sessions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("no node at {0}")]
    NoNode(String),
    #[error("node already exists at {0}")]
    NodeExists(String),
    #[error("version mismatch at {path}: expected {expected}, found {actual}")]
    BadVersion { path: String, expected: u64, actual: u64 },
    #[error("session {0} expired")]
    SessionExpired(SessionId),
    #[error("coordination service unavailable")]
    Unavailable,
    #[error("operation timed out")]
    Timeout,
}

impl LeaseError {
    /// Errors worth retrying after a delay
    pub fn is_transient(&self) -> bool {
        matches!(self, LeaseError::Unavailable | LeaseError::Timeout)
    }
}

/// Errors from the agent coordinator
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("agent {0} not found")]
    NotFound(AgentId),
    #[error("agent {0} is registered by another live session")]
    AlreadyRegistered(AgentId),
    #[error("claim on agent {0} kept conflicting")]
    ClaimConflict(AgentId),
    #[error("coordination unavailable: {op} failed after {attempts} attempts: {source}")]
    CoordinationUnavailable {
        op: &'static str,
        attempts: u32,
        #[source]
        source: LeaseError,
    },
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Lease(#[from] LeaseError),
}
