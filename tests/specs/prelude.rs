// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the behavioral specs.

#![allow(dead_code)]

pub use cix_adapters::{BusMessage, ChannelBus, Envelope, FakePluginResolver};
pub use cix_agent::{AgentConfig, CmdEngine, CmdStore, Dispatch, MemoryCmdStore, Presence, Standalone};
pub use cix_core::test_support::{executed_with, shell_cmd};
pub use cix_core::{Cmd, CmdId, ExecutedCmd, PluginRef, Status};
pub use std::sync::Arc;
pub use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound for anything a spec waits on.
pub const SPEC_WAIT: Duration = Duration::from_secs(20);

pub const CALLBACK_QUEUE: &str = "spec.callback";
pub const LOGS_EXCHANGE: &str = "spec.logs";

/// An engine wired to an in-process bus, with its workspace in a temp dir.
pub struct AgentHarness {
    pub engine: CmdEngine<ChannelBus, FakePluginResolver>,
    envelopes: UnboundedReceiver<Envelope>,
    seen: Vec<Envelope>,
    dir: TempDir,
}

impl AgentHarness {
    pub fn start() -> Self {
        Self::with_resolver(FakePluginResolver::new())
    }

    pub fn with_resolver(resolver: FakePluginResolver) -> Self {
        Self::build(resolver, Arc::new(Standalone))
    }

    /// Engine that reports its slot to a pool membership.
    pub fn in_pool(presence: Arc<dyn Presence>) -> Self {
        Self::build(FakePluginResolver::new(), presence)
    }

    fn build(resolver: FakePluginResolver, presence: Arc<dyn Presence>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::new(dir.path().join("workspace")).close_exit_code(42);
        let (bus, envelopes) = ChannelBus::new(CALLBACK_QUEUE, LOGS_EXCHANGE);
        let store = Arc::new(MemoryCmdStore::new());
        let engine = CmdEngine::with_presence(config, bus, resolver, store, presence);
        Self { engine, envelopes, seen: Vec::new(), dir }
    }

    pub fn workspace(&self) -> std::path::PathBuf {
        self.dir.path().join("workspace")
    }

    /// Collect bus traffic until `id` completes. Returns everything seen
    /// about `id`, in publish order.
    pub async fn until_completed(&mut self, id: &str) -> Vec<Envelope> {
        let id = CmdId::from(id);
        loop {
            let envelope = tokio::time::timeout(SPEC_WAIT, self.envelopes.recv())
                .await
                .expect("timed out waiting for completion")
                .expect("bus closed");
            let done = matches!(&envelope.message, BusMessage::Completed(e) if e.id == id);
            self.seen.push(envelope);
            if done {
                return self.about(&id);
            }
        }
    }

    /// Collect bus traffic until `id` logged `line`.
    pub async fn until_logged(&mut self, id: &str, line: &str) {
        let id = CmdId::from(id);
        loop {
            let envelope = tokio::time::timeout(SPEC_WAIT, self.envelopes.recv())
                .await
                .expect("timed out waiting for log line")
                .expect("bus closed");
            let hit = matches!(
                &envelope.message,
                BusMessage::Log(l) if l.cmd_id == id && l.content == line
            );
            self.seen.push(envelope);
            if hit {
                return;
            }
        }
    }

    /// Everything received so far about `id`.
    pub fn about(&self, id: &CmdId) -> Vec<Envelope> {
        self.seen.iter().filter(|e| e.message.cmd_id() == id).cloned().collect()
    }

    /// Anything already queued on the bus, without waiting.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut drained = Vec::new();
        while let Ok(envelope) = self.envelopes.try_recv() {
            self.seen.push(envelope.clone());
            drained.push(envelope);
        }
        drained
    }
}

/// Message kinds of a sequence of envelopes.
pub fn kinds(envelopes: &[Envelope]) -> Vec<String> {
    envelopes.iter().map(|e| e.message.to_string()).collect()
}
