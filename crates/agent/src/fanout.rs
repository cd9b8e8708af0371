// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery of process output lines to a fixed set of sinks.

use crate::error::SinkError;
use cix_core::{CmdId, LogLine};

/// Consumer of a command's output lines.
pub trait LogSink: Send {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    fn on_line(&mut self, line: &LogLine) -> Result<(), SinkError>;

    /// Called once after the last line; release resources here.
    fn finish(&mut self, total: u64) -> Result<(), SinkError>;
}

/// Fans each line out to every attached sink, in attach order.
///
/// A failing sink is logged and skipped; it never stops delivery to the
/// others. Sinks are finished exactly once: by [`LoggingFanout::finish`], or
/// on drop if the owner never got there (aborted or failed before the
/// first line).
pub struct LoggingFanout {
    cmd_id: CmdId,
    sinks: Vec<Box<dyn LogSink>>,
    delivered: u64,
    finished: bool,
}

impl LoggingFanout {
    pub fn new(cmd_id: CmdId) -> Self {
        Self { cmd_id, sinks: Vec::new(), delivered: 0, finished: false }
    }

    pub fn attach(&mut self, sink: impl LogSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn cmd_id(&self) -> &CmdId {
        &self.cmd_id
    }

    /// Lines delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn on_line(&mut self, line: &LogLine) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.on_line(line) {
                tracing::warn!(cmd_id = %self.cmd_id, sink = sink.name(), error = %e, "log sink failed");
            }
        }
        self.delivered += 1;
    }

    pub fn finish(mut self, total: u64) {
        self.finish_sinks(total);
    }

    fn finish_sinks(&mut self, total: u64) {
        if self.finished {
            return;
        }
        self.finished = true;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish(total) {
                tracing::warn!(cmd_id = %self.cmd_id, sink = sink.name(), error = %e, "log sink finish failed");
            }
        }
    }
}

impl Drop for LoggingFanout {
    fn drop(&mut self) {
        self.finish_sinks(self.delivered);
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
