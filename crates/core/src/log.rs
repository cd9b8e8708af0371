// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process output lines.

use crate::cmd::CmdId;
use serde::{Deserialize, Serialize};

/// One line of process output, tagged with the command that produced it.
///
/// This is also the payload of the per-line log message on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(rename = "commandId")]
    pub cmd_id: CmdId,
    pub content: String,
}

impl LogLine {
    pub fn new(cmd_id: CmdId, content: impl Into<String>) -> Self {
        Self { cmd_id, content: content.into() }
    }
}
