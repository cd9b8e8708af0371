// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cix-agent: runs commands handed to one build agent
//!
//! A command is a list of shell scripts plus inputs. The agent runs one at a
//! time, streams its output to a per-command log file and to the bus, and
//! reports a single terminal record per accepted command. In a pool it
//! marks itself busy while a command runs and gives its claim back after.

pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod fanout;
pub mod logs;
pub mod presence;
pub mod shell;
pub mod sinks;
pub mod slot;
pub mod store;

pub use config::AgentConfig;
pub use engine::{CmdEngine, Dispatch};
pub use error::{ConfigError, EngineError, SinkError, StoreError};
pub use fanout::{LogSink, LoggingFanout};
pub use logs::LOG_NOT_FOUND;
pub use presence::{PoolPresence, Presence, Standalone};
pub use shell::{ShellOutcome, ShellRunner, ShellSpec};
pub use sinks::{CmdLogSender, CmdLogWriter};
pub use store::{CmdStore, MemoryCmdStore};
