// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{Cmd, CmdId, ExecutedCmd, Status};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for status types.
pub mod strategies {
    use crate::Status;
    use proptest::prelude::*;

    pub fn arb_status() -> impl Strategy<Value = Status> {
        prop_oneof![
            Just(Status::Pending),
            Just(Status::Sent),
            Just(Status::Running),
            Just(Status::Executed),
            Just(Status::Exception),
            Just(Status::Killed),
            Just(Status::Rejected),
            Just(Status::TimeoutKill),
            Just(Status::Stopped),
        ]
    }
}

// ── Factories ───────────────────────────────────────────────────────────

/// A shell command running `scripts` with a test id.
pub fn shell_cmd(id: &str, scripts: &[&str]) -> Cmd {
    Cmd::shell(id, scripts.iter().map(|s| s.to_string()).collect())
}

/// An executed record already at `status`.
pub fn executed_with(id: &str, status: Status) -> ExecutedCmd {
    let mut executed = ExecutedCmd::new(CmdId::from(id));
    executed.update_status(status);
    executed
}
