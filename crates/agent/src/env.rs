// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent crate.

use std::path::PathBuf;
use std::time::Duration;

/// Variable injected into every command with the agent workspace path
pub const AGENT_WORKSPACE_VAR: &str = "CIX_AGENT_WORKSPACE";

/// Variable injected into every command with the plugin root path
pub const AGENT_PLUGIN_PATH_VAR: &str = "CIX_AGENT_PLUGIN_PATH";

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

pub fn agent_id() -> Option<String> {
    var("CIX_AGENT_ID")
}

pub fn workspace() -> Option<PathBuf> {
    var("CIX_WORKSPACE").map(PathBuf::from)
}

pub fn log_dir() -> Option<PathBuf> {
    var("CIX_LOG_DIR").map(PathBuf::from)
}

pub fn plugin_dir() -> Option<PathBuf> {
    var("CIX_PLUGIN_DIR").map(PathBuf::from)
}

/// Default command timeout (`CIX_CMD_TIMEOUT_SECS`)
pub fn cmd_timeout() -> Option<Duration> {
    var("CIX_CMD_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()).map(Duration::from_secs)
}

pub fn shell() -> Option<String> {
    var("CIX_SHELL")
}

pub fn callback_queue() -> Option<String> {
    var("CIX_CALLBACK_QUEUE")
}

pub fn logs_exchange() -> Option<String> {
    var("CIX_LOGS_EXCHANGE")
}

/// Exit code used when a CLOSE command shuts the agent down
pub fn close_exit_code() -> Option<i32> {
    var("CIX_CLOSE_EXIT_CODE").and_then(|s| s.parse::<i32>().ok())
}

/// Path of the TOML config file (`CIX_CONFIG`)
pub fn config_path() -> Option<PathBuf> {
    var("CIX_CONFIG").map(PathBuf::from)
}

/// Workspace when nothing else is configured: `$HOME/.cix/workspace`, or
/// under the temp dir without a home.
pub fn default_workspace() -> PathBuf {
    match var("HOME") {
        Some(home) => PathBuf::from(home).join(".cix").join("workspace"),
        None => std::env::temp_dir().join("cix").join("workspace"),
    }
}
