// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cix-adapters: seams between the agent and the outside world
//!
//! The engine only depends on the traits here: a message bus it publishes
//! command lifecycle and log lines to, and a resolver that locates plugins.

pub mod bus;
pub mod plugin;

pub use bus::{BusError, BusMessage, ChannelBus, Envelope, MessageBus, Route};
pub use plugin::{DirPluginResolver, PluginResolver, ResolveError};

#[cfg(any(test, feature = "test-support"))]
pub use bus::FakeBus;
#[cfg(any(test, feature = "test-support"))]
pub use plugin::FakePluginResolver;
