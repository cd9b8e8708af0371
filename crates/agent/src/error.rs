// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cix_core::CmdId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the command engine's public operations.
///
/// Resolution and process failures are not errors here: they end up as
/// terminal statuses on the command's record.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("command {0} not found")]
    NotFound(CmdId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("log read failed: {0}")]
    Log(#[from] std::io::Error),
}

/// Errors from a command record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors loading agent configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from a log sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink closed")]
    Closed,
}
