// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cix-coord: agent pool coordination
//!
//! Agents hold session-bound membership nodes in a lease store; dispatchers
//! claim agents exclusively through lock nodes and watch their status.

pub mod config;
pub mod coordination;
pub mod coordinator;
pub mod error;
pub mod lease;
pub mod watch;

pub use config::{CoordConfig, DEFAULT_ROOT};
pub use coordination::Coordination;
pub use coordinator::{AgentCoordinator, Claim, Membership, StatusChangeEvent};
pub use error::{CoordError, LeaseError};
pub use lease::{CreateMode, LeaseSession, LeaseStore, NodeEvent, NodeEventKind, SessionId, Stat};
pub use watch::StatusWatch;
