// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result record of a command run on an agent.

use crate::cmd::{CmdId, VariableMap};
use crate::status::{merge, Status};
use serde::{Deserialize, Serialize};

/// Exit code recorded when the agent killed the process for exceeding its timeout.
pub const CODE_TIMEOUT: i32 = -100;

/// Outcome of one accepted command.
///
/// `status` is private: it only changes through [`ExecutedCmd::update_status`]
/// and [`ExecutedCmd::merge_from`], which never move it to a lower level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedCmd {
    pub id: CmdId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
    status: Status,
    /// Shell exit code; `None` when the process never exited on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default)]
    pub output: VariableMap,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<u64>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_at: Option<u64>,
    /// Number of log lines the command produced
    #[serde(default)]
    pub log_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutedCmd {
    /// A fresh `PENDING` record.
    pub fn new(id: CmdId) -> Self {
        Self {
            id,
            process_id: None,
            status: Status::Pending,
            code: None,
            output: VariableMap::new(),
            start_at: None,
            finish_at: None,
            log_size: 0,
            error: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Apply a status report. Returns the status now in effect.
    pub fn update_status(&mut self, incoming: Status) -> Status {
        self.status = merge(self.status, incoming);
        self.status
    }

    /// Fold a racing report for the same command into this one.
    ///
    /// The report with the higher status level wins as a whole (exit code,
    /// output and timestamps come with it); a lower-level report is ignored.
    /// Returns true if `other` was taken.
    pub fn merge_from(&mut self, other: ExecutedCmd) -> bool {
        if merge(self.status, other.status) == other.status {
            *self = other;
            true
        } else {
            false
        }
    }

    /// Finish minus start in milliseconds, or `-1` if either is unknown.
    pub fn duration(&self) -> i64 {
        match (self.start_at, self.finish_at) {
            (Some(start), Some(finish)) => finish as i64 - start as i64,
            _ => -1,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }
}

#[cfg(test)]
#[path = "executed_tests.rs"]
mod tests;
