// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message bus the agent reports to.

use async_trait::async_trait;
use cix_core::{CmdId, ExecutedCmd, LogLine, ReceivedCmd};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus closed")]
    Closed,
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Messages an agent emits while handling a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum BusMessage {
    Received(ReceivedCmd),
    Started(ExecutedCmd),
    Completed(ExecutedCmd),
    Log(LogLine),
}

/// Which destination a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Lifecycle reports for the coordinator
    Callback,
    /// Live log stream for watchers
    Logs,
}

impl BusMessage {
    pub fn route(&self) -> Route {
        match self {
            BusMessage::Log(_) => Route::Logs,
            _ => Route::Callback,
        }
    }

    pub fn cmd_id(&self) -> &CmdId {
        match self {
            BusMessage::Received(received) => &received.cmd.id,
            BusMessage::Started(executed) | BusMessage::Completed(executed) => &executed.id,
            BusMessage::Log(line) => &line.cmd_id,
        }
    }
}

cix_core::simple_display! {
    BusMessage {
        Received(..) => "received",
        Started(..) => "started",
        Completed(..) => "completed",
        Log(..) => "log",
    }
}

/// Adapter for publishing agent messages
#[async_trait]
pub trait MessageBus: Clone + Send + Sync + 'static {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError>;
}

/// A message together with the destination name it was addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub destination: String,
    pub message: BusMessage,
}

/// In-process bus backed by an unbounded tokio channel.
///
/// Messages are addressed to the configured callback queue or logs exchange
/// name and handed to whoever holds the receiver.
#[derive(Clone, Debug)]
pub struct ChannelBus {
    callback_queue: String,
    logs_exchange: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelBus {
    pub fn new(
        callback_queue: impl Into<String>,
        logs_exchange: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Self { callback_queue: callback_queue.into(), logs_exchange: logs_exchange.into(), tx };
        (bus, rx)
    }

    fn destination(&self, route: Route) -> &str {
        match route {
            Route::Callback => &self.callback_queue,
            Route::Logs => &self.logs_exchange,
        }
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        let destination = self.destination(message.route()).to_string();
        tracing::trace!(%destination, kind = %message, cmd_id = %message.cmd_id(), "publish");
        self.tx.send(Envelope { destination, message }).map_err(|_| BusError::Closed)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{BusError, BusMessage, MessageBus};
    use async_trait::async_trait;
    use cix_core::{CmdId, ExecutedCmd, LogLine};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeBusState {
        messages: Vec<BusMessage>,
        fail: bool,
    }

    /// Recording bus for testing
    #[derive(Clone, Default)]
    pub struct FakeBus {
        inner: Arc<Mutex<FakeBusState>>,
    }

    impl FakeBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent publish fail
        pub fn set_failing(&self, fail: bool) {
            self.inner.lock().fail = fail;
        }

        /// All published messages in order
        pub fn messages(&self) -> Vec<BusMessage> {
            self.inner.lock().messages.clone()
        }

        /// Messages about one command, in order
        pub fn messages_for(&self, id: &CmdId) -> Vec<BusMessage> {
            self.inner.lock().messages.iter().filter(|m| m.cmd_id() == id).cloned().collect()
        }

        /// Completion reports for one command
        pub fn completed(&self, id: &CmdId) -> Vec<ExecutedCmd> {
            self.messages_for(id)
                .into_iter()
                .filter_map(|m| match m {
                    BusMessage::Completed(executed) => Some(executed),
                    _ => None,
                })
                .collect()
        }

        /// Log lines published for one command
        pub fn log_lines(&self, id: &CmdId) -> Vec<String> {
            self.messages_for(id)
                .into_iter()
                .filter_map(|m| match m {
                    BusMessage::Log(LogLine { content, .. }) => Some(content),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MessageBus for FakeBus {
        async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
            let mut inner = self.inner.lock();
            if inner.fail {
                return Err(BusError::PublishFailed("fake bus failure".to_string()));
            }
            inner.messages.push(message);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBus;

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
