// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specs for cix, exercised across crates.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/agent/dispatch.rs"]
mod agent_dispatch;
#[path = "specs/agent/kill.rs"]
mod agent_kill;
#[path = "specs/coord/pool.rs"]
mod coord_pool;
#[path = "specs/status/ordering.rs"]
mod status_ordering;
