// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command status and its merge order.
//!
//! Status reports for the same command can arrive out of order (the agent's
//! completion may overtake its own "running" report on the bus). Every update
//! goes through [`merge`], which keeps whichever status is further along:
//!
//! ```text
//! PENDING(-1) < SENT(0) < RUNNING(1) < EXECUTED(2)
//!     < EXCEPTION | KILLED | REJECTED (3) < TIMEOUT_KILL | STOPPED (4)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle status of a command on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Accepted, not yet handed to the process
    Pending,
    Sent,
    /// Process is running
    Running,
    /// Process exited on its own, whatever the exit code
    Executed,
    /// Could not run (e.g. plugin resolution failed)
    Exception,
    Killed,
    Rejected,
    TimeoutKill,
    Stopped,
}

impl Status {
    /// Merge level. Declaration order is not used for ordering.
    pub fn level(self) -> i8 {
        match self {
            Status::Pending => -1,
            Status::Sent => 0,
            Status::Running => 1,
            Status::Executed => 2,
            Status::Exception | Status::Killed | Status::Rejected => 3,
            Status::TimeoutKill | Status::Stopped => 4,
        }
    }

    /// Terminal statuses: no process is (or will be) running for the command.
    pub fn is_finished(self) -> bool {
        self.level() >= Status::Executed.level()
    }
}

crate::simple_display! {
    Status {
        Pending => "PENDING",
        Sent => "SENT",
        Running => "RUNNING",
        Executed => "EXECUTED",
        Exception => "EXCEPTION",
        Killed => "KILLED",
        Rejected => "REJECTED",
        TimeoutKill => "TIMEOUT_KILL",
        Stopped => "STOPPED",
    }
}

/// Resolve two racing status updates for the same command.
///
/// Returns `incoming` when its level is at least that of `current`, so
/// same-level updates take the newer report.
pub fn merge(current: Status, incoming: Status) -> Status {
    if incoming.level() >= current.level() {
        incoming
    } else {
        current
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
