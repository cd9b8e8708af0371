// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands sent from the coordinator to an agent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

crate::define_id! {
    /// Identifier of one unit of work on an agent.
    ///
    /// Dispatchers derive it from the job and step (`{job_id}-{step_path}`);
    /// it also names the command's log file.
    pub struct CmdId("cmd-");
}

/// Input and output variables, ordered for stable serialization.
pub type VariableMap = BTreeMap<String, String>;

/// Kind of control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CmdType {
    /// Run scripts in a shell
    Shell,
    /// Abort whatever occupies the execution slot
    Kill,
    /// Shut the agent down
    Close,
}

crate::simple_display! {
    CmdType {
        Shell => "SHELL",
        Kill => "KILL",
        Close => "CLOSE",
    }
}

/// A plugin (reusable build step) a command needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginRef {
    pub name: String,
    pub version: String,
}

impl PluginRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PluginRef {
    type Err = String;

    /// Parses `name@version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(format!("expected name@version, got '{}'", s)),
        }
    }
}

/// One unit of work sent to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmd {
    pub id: CmdId,
    #[serde(rename = "type")]
    pub cmd_type: CmdType,
    /// Input variables, exported to the process environment
    #[serde(default)]
    pub inputs: VariableMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginRef>,
    /// Working directory hint; relative paths resolve against the agent workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    /// Shell lines to run, in order
    #[serde(default)]
    pub scripts: Vec<String>,
    /// Prefixes of environment variables captured as output after the scripts ran
    #[serde(default)]
    pub env_filters: Vec<String>,
    /// Execution limit in seconds; the agent default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Cmd {
    fn with_type(id: CmdId, cmd_type: CmdType) -> Self {
        Self {
            id,
            cmd_type,
            inputs: VariableMap::new(),
            plugin: None,
            work_dir: None,
            scripts: Vec::new(),
            env_filters: Vec::new(),
            timeout: None,
        }
    }

    pub fn shell(id: impl Into<CmdId>, scripts: Vec<String>) -> Self {
        Self { scripts, ..Self::with_type(id.into(), CmdType::Shell) }
    }

    pub fn kill() -> Self {
        Self::with_type(CmdId::new(), CmdType::Kill)
    }

    pub fn close() -> Self {
        Self::with_type(CmdId::new(), CmdType::Close)
    }

    /// Add an input variable.
    pub fn input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    crate::setters! {
        set { env_filters: Vec<String> }
        option { plugin: PluginRef, work_dir: String, timeout: u64 }
    }
}

/// A command as persisted by the agent when it accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedCmd {
    #[serde(flatten)]
    pub cmd: Cmd,
    pub received_at_ms: u64,
}

#[cfg(test)]
#[path = "cmd_tests.rs"]
mod tests;
