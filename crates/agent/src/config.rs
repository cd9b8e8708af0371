// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration: optional TOML file, then environment overrides.

use crate::env;
use crate::error::ConfigError;
use cix_core::AgentId;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(1800);
pub const DEFAULT_SHELL: &str = "bash";
pub const DEFAULT_CALLBACK_QUEUE: &str = "cix.cmd.callback";
pub const DEFAULT_LOGS_EXCHANGE: &str = "cix.cmd.logs";

/// On-disk form; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    agent_id: Option<String>,
    workspace: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    plugin_dir: Option<PathBuf>,
    cmd_timeout_secs: Option<u64>,
    shell: Option<String>,
    callback_queue: Option<String>,
    logs_exchange: Option<String>,
    close_exit_code: Option<i32>,
}

/// Runtime settings of one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub agent_id: AgentId,
    /// Default working directory of commands
    pub workspace: PathBuf,
    /// Where `{cmd_id}.log` files go
    pub log_dir: PathBuf,
    pub plugin_dir: PathBuf,
    /// Limit for commands that do not carry their own timeout
    pub cmd_timeout: Duration,
    /// Interpreter the scripts run under (`{shell} -c`)
    pub shell: String,
    pub callback_queue: String,
    pub logs_exchange: String,
    pub close_exit_code: i32,
}

impl AgentConfig {
    /// Defaults rooted at `workspace`: logs in `{workspace}/logs`, plugins in
    /// `{workspace}/plugins`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            agent_id: AgentId::new(),
            log_dir: workspace.join("logs"),
            plugin_dir: workspace.join("plugins"),
            workspace,
            cmd_timeout: DEFAULT_CMD_TIMEOUT,
            shell: DEFAULT_SHELL.to_string(),
            callback_queue: DEFAULT_CALLBACK_QUEUE.to_string(),
            logs_exchange: DEFAULT_LOGS_EXCHANGE.to_string(),
            close_exit_code: 0,
        }
    }

    cix_core::setters! {
        into { agent_id: AgentId, log_dir: PathBuf, plugin_dir: PathBuf, shell: String, callback_queue: String, logs_exchange: String }
        set { cmd_timeout: Duration, close_exit_code: i32 }
    }

    /// Load `CIX_CONFIG` if set, then apply `CIX_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match env::config_path() {
            Some(path) => Self::read_file(&path)?,
            None => ConfigFile::default(),
        };
        let mut config = Self::from_file(file);
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML document, without looking at the environment.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_file(toml::from_str(text)?))
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Ok(toml::from_str(&text)?)
    }

    fn from_file(file: ConfigFile) -> Self {
        let mut config = Self::new(file.workspace.unwrap_or_else(env::default_workspace));
        if let Some(id) = file.agent_id {
            config.agent_id = AgentId::from(id);
        }
        if let Some(dir) = file.log_dir {
            config.log_dir = dir;
        }
        if let Some(dir) = file.plugin_dir {
            config.plugin_dir = dir;
        }
        if let Some(secs) = file.cmd_timeout_secs {
            config.cmd_timeout = Duration::from_secs(secs);
        }
        if let Some(shell) = file.shell {
            config.shell = shell;
        }
        if let Some(queue) = file.callback_queue {
            config.callback_queue = queue;
        }
        if let Some(exchange) = file.logs_exchange {
            config.logs_exchange = exchange;
        }
        if let Some(code) = file.close_exit_code {
            config.close_exit_code = code;
        }
        config
    }

    fn apply_env(&mut self) {
        if let Some(workspace) = env::workspace() {
            // Derived dirs follow the workspace unless set explicitly
            if self.log_dir == self.workspace.join("logs") {
                self.log_dir = workspace.join("logs");
            }
            if self.plugin_dir == self.workspace.join("plugins") {
                self.plugin_dir = workspace.join("plugins");
            }
            self.workspace = workspace;
        }
        if let Some(id) = env::agent_id() {
            self.agent_id = AgentId::from(id);
        }
        if let Some(dir) = env::log_dir() {
            self.log_dir = dir;
        }
        if let Some(dir) = env::plugin_dir() {
            self.plugin_dir = dir;
        }
        if let Some(timeout) = env::cmd_timeout() {
            self.cmd_timeout = timeout;
        }
        if let Some(shell) = env::shell() {
            self.shell = shell;
        }
        if let Some(queue) = env::callback_queue() {
            self.callback_queue = queue;
        }
        if let Some(exchange) = env::logs_exchange() {
            self.logs_exchange = exchange;
        }
        if let Some(code) = env::close_exit_code() {
            self.close_exit_code = code;
        }
    }

    /// Log file of one command.
    pub fn log_path(&self, cmd_id: &cix_core::CmdId) -> PathBuf {
        self.log_dir.join(format!("{}.log", cmd_id))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
