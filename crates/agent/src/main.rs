// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cix-agent binary.
//!
//! Reads commands as JSON lines on stdin and writes every bus message as a
//! JSON envelope line on stdout. The agent's own log goes to
//! `{log_dir}/cix-agent.log`, filtered by `RUST_LOG` (default `info`).
//! A CLOSE command ends the process with the configured exit code.
//!
//! The agent registers in a lease store hosted by this process and keeps
//! its membership status in step with the command slot.

use cix_adapters::{ChannelBus, DirPluginResolver, Envelope};
use cix_agent::{AgentConfig, CmdEngine, MemoryCmdStore, PoolPresence};
use cix_coord::{AgentCoordinator, CoordConfig, LeaseStore};
use cix_core::{Cmd, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const AGENT_LOG: &str = "cix-agent.log";

fn init_tracing(config: &AgentConfig) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;
    let appender = tracing_appender::rolling::never(&config.log_dir, AGENT_LOG);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

async fn print_envelopes(mut envelopes: mpsc::UnboundedReceiver<Envelope>) {
    let mut stdout = tokio::io::stdout();
    while let Some(envelope) = envelopes.recv().await {
        let mut line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode bus message");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            tracing::warn!(error = %e, "stdout closed, dropping bus messages");
            return;
        }
        let _ = stdout.flush().await;
    }
}

async fn run() -> Result<i32, BoxError> {
    let config = AgentConfig::load()?;
    let _guard = init_tracing(&config)?;
    tracing::info!(
        agent_id = %config.agent_id,
        workspace = %config.workspace.display(),
        log_dir = %config.log_dir.display(),
        "cix-agent starting"
    );

    let (bus, envelopes) = ChannelBus::new(config.callback_queue.clone(), config.logs_exchange.clone());
    let printer = tokio::spawn(print_envelopes(envelopes));
    let resolver = DirPluginResolver::new(config.plugin_dir.clone());

    let coord = CoordConfig::default();
    let leases = LeaseStore::new(SystemClock);
    let reaper = leases.spawn_reaper(coord.heartbeat_interval());
    let session = leases.connect(coord.session_ttl)?;
    let heartbeat = session.spawn_heartbeat(coord.heartbeat_interval());
    let agent_id = config.agent_id.clone();
    let presence = PoolPresence::join(AgentCoordinator::new(session, coord), agent_id, None).await?;

    let store = Arc::new(MemoryCmdStore::new());
    let engine = CmdEngine::with_presence(config, bus, resolver, store, Arc::new(presence));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = loop {
        tokio::select! {
            code = engine.closed() => break code,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed, waiting for the running command");
                    while engine.current().is_some() {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    break 0;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Cmd>(&line) {
                    Ok(cmd) => {
                        if let Err(e) = engine.on_cmd_received(cmd).await {
                            tracing::error!(error = %e, "command handling failed");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed command line"),
                }
            }
        }
    };

    drop(engine);
    heartbeat.abort();
    reaper.abort();
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        tracing::debug!("bus printer still busy at exit");
    }
    tracing::info!(code, "cix-agent exiting");
    Ok(code)
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("cix-agent: {}", e);
            1
        }
    };
    std::process::exit(code);
}
