// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight command execution.
//!
//! The engine runs at most one command at a time. A SHELL command that
//! arrives while the slot is occupied is rejected, never queued. Every
//! accepted command gets exactly one executed record and one `Completed`
//! report, whether it finished, failed to start, timed out or was killed.
//!
//! Per command the bus sees `Received`, then `Started` (unless plugin
//! resolution failed), then log lines, then `Completed`.

use crate::config::AgentConfig;
use crate::env::{AGENT_PLUGIN_PATH_VAR, AGENT_WORKSPACE_VAR};
use crate::error::EngineError;
use crate::fanout::LoggingFanout;
use crate::logs;
use crate::presence::{Presence, Standalone};
use crate::shell::{kill_group, ShellOutcome, ShellRunner, ShellSpec};
use crate::sinks::{CmdLogSender, CmdLogWriter};
use crate::slot::{Progress, Slot, Ticket};
use crate::store::CmdStore;
use cix_adapters::{BusMessage, MessageBus, PluginResolver};
use cix_core::{
    Clock, Cmd, CmdId, CmdType, ExecutedCmd, Page, ReceivedCmd, Status, SystemClock, CODE_TIMEOUT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// What the engine did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// SHELL command took the slot
    Accepted(CmdId),
    /// SHELL command refused because another command holds the slot
    Rejected { id: CmdId, busy_with: Option<CmdId> },
    /// KILL handled; carries the aborted command, if any
    Killed(Option<CmdId>),
    /// CLOSE handled; shutdown was signalled with this exit code
    Closing(i32),
}

fn now_ms() -> u64 {
    SystemClock.epoch_ms()
}

struct Inner<B: MessageBus, P: PluginResolver> {
    config: AgentConfig,
    bus: B,
    resolver: P,
    store: Arc<dyn CmdStore>,
    presence: Arc<dyn Presence>,
    slot: Slot,
    shell: ShellRunner,
    shutdown: watch::Sender<Option<i32>>,
}

/// Executes commands on this agent.
pub struct CmdEngine<B: MessageBus, P: PluginResolver> {
    inner: Arc<Inner<B, P>>,
}

impl<B: MessageBus, P: PluginResolver> Clone for CmdEngine<B, P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: MessageBus, P: PluginResolver> CmdEngine<B, P> {
    pub fn new(config: AgentConfig, bus: B, resolver: P, store: Arc<dyn CmdStore>) -> Self {
        Self::with_presence(config, bus, resolver, store, Arc::new(Standalone))
    }

    /// Engine that reports slot changes to `presence`.
    pub fn with_presence(
        config: AgentConfig,
        bus: B,
        resolver: P,
        store: Arc<dyn CmdStore>,
        presence: Arc<dyn Presence>,
    ) -> Self {
        let (shutdown, _) = watch::channel(None);
        let shell = ShellRunner::new(config.shell.clone());
        let inner =
            Inner { config, bus, resolver, store, presence, slot: Slot::new(), shell, shutdown };
        Self { inner: Arc::new(inner) }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Entry point for commands arriving from the bus.
    pub async fn on_cmd_received(&self, cmd: Cmd) -> Result<Dispatch, EngineError> {
        tracing::info!(cmd_id = %cmd.id, cmd_type = %cmd.cmd_type, "command received");
        self.execute(cmd).await
    }

    pub async fn execute(&self, cmd: Cmd) -> Result<Dispatch, EngineError> {
        match cmd.cmd_type {
            CmdType::Shell => self.accept(cmd).await,
            CmdType::Kill => Ok(Dispatch::Killed(self.kill().await?)),
            CmdType::Close => self.close().await,
        }
    }

    /// Command currently holding the slot.
    pub fn current(&self) -> Option<CmdId> {
        self.inner.slot.current()
    }

    async fn accept(&self, cmd: Cmd) -> Result<Dispatch, EngineError> {
        let inner = &self.inner;
        let Some(ticket) = inner.slot.try_occupy(&cmd.id) else {
            let busy_with = inner.slot.current();
            tracing::warn!(cmd_id = %cmd.id, busy_with = ?busy_with, "agent busy, command rejected");
            return Ok(Dispatch::Rejected { id: cmd.id, busy_with });
        };

        let id = cmd.id.clone();
        let received = ReceivedCmd { cmd: cmd.clone(), received_at_ms: now_ms() };
        let saved = inner
            .store
            .save_received(received.clone())
            .and_then(|()| inner.store.reset_executed(ExecutedCmd::new(id.clone())));
        if let Err(e) = saved {
            inner.slot.clear_if(ticket.generation);
            return Err(e.into());
        }
        inner.publish(BusMessage::Received(received)).await;
        inner.presence.busy(&id).await;

        // The worker waits for the go signal so it never runs unless the
        // slot still belongs to it.
        let (go, ready) = oneshot::channel::<()>();
        let generation = ticket.generation;
        let worker = Arc::clone(inner);
        let task = tokio::spawn(async move {
            if ready.await.is_ok() {
                worker.run(cmd, ticket).await;
            }
        });

        if inner.slot.start(generation, task.abort_handle()) {
            let _ = go.send(());
            tracing::info!(cmd_id = %id, "command accepted");
        } else {
            drop(go);
            tracing::info!(cmd_id = %id, "command killed while being accepted");
            inner.report_killed(&id, None).await?;
            inner.presence.idle(&id).await;
        }
        Ok(Dispatch::Accepted(id))
    }

    /// Hard-abort whatever occupies the slot. The slot is free when this
    /// returns; the process group is sent SIGKILL without waiting for it.
    pub async fn kill(&self) -> Result<Option<CmdId>, EngineError> {
        let Some(occupant) = self.inner.slot.take() else {
            tracing::info!("kill: no command running");
            return Ok(None);
        };
        tracing::info!(cmd_id = %occupant.cmd_id, "killing command");
        if occupant.is_started() {
            occupant.abort();
            if let Some(pid) = occupant.progress.pid() {
                kill_group(pid);
            }
            self.inner.report_killed(&occupant.cmd_id, Some(occupant.progress.as_ref())).await?;
            self.inner.presence.idle(&occupant.cmd_id).await;
        }
        Ok(Some(occupant.cmd_id))
    }

    async fn close(&self) -> Result<Dispatch, EngineError> {
        if let Some(id) = self.kill().await? {
            tracing::info!(cmd_id = %id, "running command killed on close");
        }
        let code = self.inner.config.close_exit_code;
        self.inner.shutdown.send_replace(Some(code));
        tracing::info!(code, "agent closing");
        Ok(Dispatch::Closing(code))
    }

    /// Resolves with the exit code once a CLOSE command was handled.
    pub async fn closed(&self) -> i32 {
        let mut rx = self.inner.shutdown.subscribe();
        loop {
            if let Some(code) = *rx.borrow_and_update() {
                return code;
            }
            if rx.changed().await.is_err() {
                return self.inner.config.close_exit_code;
            }
        }
    }

    pub fn get(&self, id: &CmdId) -> Result<ReceivedCmd, EngineError> {
        self.inner.store.get_received(id)?.ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    pub fn executed(&self, id: &CmdId) -> Result<ExecutedCmd, EngineError> {
        self.inner.store.get_executed(id)?.ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// One page of a command's log file.
    pub async fn logs(&self, id: &CmdId, page: usize, size: usize) -> Result<Page<String>, EngineError> {
        let known_total =
            self.inner.store.get_executed(id)?.filter(ExecutedCmd::is_finished).map(|e| e.log_size);
        Ok(logs::read_page(&self.inner.config.log_path(id), page, size, known_total).await?)
    }

    pub fn list_received(&self, page: usize, size: usize) -> Result<Page<ReceivedCmd>, EngineError> {
        Ok(Page::from_sorted(self.inner.store.list_received()?, page, size))
    }

    pub fn list_executed(&self, page: usize, size: usize) -> Result<Page<ExecutedCmd>, EngineError> {
        Ok(Page::from_sorted(self.inner.store.list_executed()?, page, size))
    }
}

impl<B: MessageBus, P: PluginResolver> Inner<B, P> {
    async fn publish(&self, message: BusMessage) {
        let kind = message.to_string();
        if let Err(e) = self.bus.publish(message).await {
            tracing::warn!(%kind, error = %e, "bus publish failed");
        }
    }

    /// Body of the worker task.
    async fn run(&self, cmd: Cmd, ticket: Ticket) {
        let id = cmd.id.clone();
        let mut executed = ExecutedCmd::new(id.clone());

        if let Some(plugin) = &cmd.plugin {
            match self.resolver.resolve(plugin).await {
                Ok(dir) => tracing::debug!(cmd_id = %id, %plugin, dir = %dir.display(), "plugin resolved"),
                Err(e) => {
                    tracing::warn!(cmd_id = %id, %plugin, error = %e, "plugin resolution failed");
                    executed.update_status(Status::Exception);
                    executed.error = Some(e.to_string());
                    executed.finish_at = Some(now_ms());
                    self.complete(ticket.generation, executed).await;
                    return;
                }
            }
        }

        let mut env = cmd.inputs.clone();
        env.insert(AGENT_WORKSPACE_VAR.to_string(), self.config.workspace.display().to_string());
        env.insert(AGENT_PLUGIN_PATH_VAR.to_string(), self.resolver.root().display().to_string());
        if let Err(e) = tokio::fs::create_dir_all(&self.config.workspace).await {
            tracing::warn!(cmd_id = %id, error = %e, "cannot create workspace");
        }
        let spec = ShellSpec {
            scripts: cmd.scripts,
            env,
            work_dir: self.work_dir_for(&id, cmd.work_dir.as_deref()),
            timeout: cmd.timeout.map(Duration::from_secs).unwrap_or(self.config.cmd_timeout),
            env_filters: cmd.env_filters,
        };

        // Sinks go on before the process starts
        let mut fanout = LoggingFanout::new(id.clone());
        fanout.attach(CmdLogWriter::open(&self.config.log_dir, &id));
        let (sender, forwarder) = CmdLogSender::spawn(self.bus.clone(), id.clone());
        fanout.attach(sender);

        executed.update_status(Status::Running);
        executed.start_at = Some(now_ms());
        match self.store.save_executed(executed.clone()) {
            Ok(stored) => self.publish(BusMessage::Started(stored)).await,
            Err(e) => tracing::warn!(cmd_id = %id, error = %e, "cannot save running record"),
        }

        let result = self.shell.run(&spec, &ticket.progress, &mut fanout).await;
        fanout.finish(ticket.progress.lines());
        if let Err(e) = forwarder.await {
            tracing::warn!(cmd_id = %id, error = %e, "log forwarder failed");
        }

        executed.process_id = ticket.progress.pid();
        executed.finish_at = Some(now_ms());
        executed.log_size = ticket.progress.lines();
        match result {
            Ok(run) => {
                executed.output = run.output;
                match run.outcome {
                    ShellOutcome::Exited(code) => {
                        executed.code = Some(code);
                        executed.update_status(Status::Executed);
                    }
                    ShellOutcome::Signaled => {
                        executed.update_status(Status::Killed);
                    }
                    ShellOutcome::TimedOut => {
                        executed.code = Some(CODE_TIMEOUT);
                        executed.update_status(Status::TimeoutKill);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(cmd_id = %id, error = %e, "process failed to start");
                executed.error = Some(format!("failed to start process: {}", e));
                executed.update_status(Status::Exception);
            }
        }
        self.complete(ticket.generation, executed).await;
    }

    fn work_dir_for(&self, id: &CmdId, hint: Option<&str>) -> PathBuf {
        let dir = match hint.map(Path::new) {
            Some(hint) if hint.is_absolute() => hint.to_path_buf(),
            Some(hint) => self.config.workspace.join(hint),
            None => self.config.workspace.clone(),
        };
        tracing::debug!(cmd_id = %id, dir = %dir.display(), "work dir");
        dir
    }

    /// Record and report a worker's result, unless the command was killed
    /// (in which case the kill already reported it).
    async fn complete(&self, generation: u64, executed: ExecutedCmd) {
        if !self.slot.clear_if(generation) {
            tracing::debug!(cmd_id = %executed.id, "result of killed command dropped");
            return;
        }
        tracing::info!(
            cmd_id = %executed.id,
            status = %executed.status(),
            code = executed.code,
            duration_ms = executed.duration(),
            "command completed"
        );
        let stored = match self.store.save_executed(executed.clone()) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(cmd_id = %executed.id, error = %e, "cannot save executed record");
                executed
            }
        };
        let id = stored.id.clone();
        self.publish(BusMessage::Completed(stored)).await;
        self.presence.idle(&id).await;
    }

    async fn report_killed(&self, id: &CmdId, progress: Option<&Progress>) -> Result<(), EngineError> {
        let mut executed =
            self.store.get_executed(id)?.unwrap_or_else(|| ExecutedCmd::new(id.clone()));
        executed.update_status(Status::Killed);
        executed.finish_at = Some(now_ms());
        if let Some(progress) = progress {
            executed.process_id = executed.process_id.or(progress.pid());
            executed.log_size = progress.lines();
        }
        let stored = self.store.save_executed(executed)?;
        tracing::info!(cmd_id = %id, "command killed");
        self.publish(BusMessage::Completed(stored)).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
