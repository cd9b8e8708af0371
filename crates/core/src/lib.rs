// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cix-core: shared domain types for the cix coordinator and agents

pub mod macros;

pub mod agent;
pub mod clock;
pub mod cmd;
pub mod executed;
pub mod id;
pub mod log;
pub mod page;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{Agent, AgentId, AgentStatus, ParseAgentStatusError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use cmd::{Cmd, CmdId, CmdType, PluginRef, ReceivedCmd, VariableMap};
pub use executed::{ExecutedCmd, CODE_TIMEOUT};
pub use id::short;
pub use log::LogLine;
pub use page::Page;
pub use status::{merge, Status};
