// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log sinks: the per-command log file and the live bus stream.

use crate::error::SinkError;
use crate::fanout::LogSink;
use cix_adapters::{BusMessage, MessageBus};
use cix_core::{CmdId, LogLine};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Writes lines to `{log_dir}/{cmd_id}.log`.
///
/// If the file cannot be opened the sink stays attached but drops lines;
/// the failure is logged once.
pub struct CmdLogWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl CmdLogWriter {
    pub fn open(log_dir: &Path, cmd_id: &CmdId) -> Self {
        let path = log_dir.join(format!("{}.log", cmd_id));
        let writer = match Self::create(log_dir, &path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                tracing::warn!(%cmd_id, path = %path.display(), error = %e, "cannot open command log");
                None
            }
        };
        Self { path, writer }
    }

    fn create(log_dir: &Path, path: &Path) -> std::io::Result<File> {
        fs::create_dir_all(log_dir)?;
        File::create(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for CmdLogWriter {
    fn name(&self) -> &'static str {
        "file"
    }

    fn on_line(&mut self, line: &LogLine) -> Result<(), SinkError> {
        match &mut self.writer {
            Some(writer) => Ok(writeln!(writer, "{}", line.content)?),
            None => Ok(()),
        }
    }

    fn finish(&mut self, _total: u64) -> Result<(), SinkError> {
        match self.writer.take() {
            Some(mut writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}

/// Streams lines to the bus's logs destination.
///
/// Publishing happens on a separate task fed by an unbounded channel, so a
/// slow bus never blocks the process readers. The task ends after finish,
/// once every queued line is published.
pub struct CmdLogSender {
    tx: Option<mpsc::UnboundedSender<LogLine>>,
}

impl CmdLogSender {
    pub fn spawn<B: MessageBus>(bus: B, cmd_id: CmdId) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();
        let handle = tokio::spawn(async move {
            let mut failures = 0u64;
            while let Some(line) = rx.recv().await {
                if let Err(e) = bus.publish(BusMessage::Log(line)).await {
                    failures += 1;
                    if failures == 1 {
                        tracing::warn!(%cmd_id, error = %e, "log line publish failed");
                    }
                }
            }
            if failures > 0 {
                tracing::warn!(%cmd_id, failures, "log lines lost");
            }
        });
        (Self { tx: Some(tx) }, handle)
    }
}

impl LogSink for CmdLogSender {
    fn name(&self) -> &'static str {
        "bus"
    }

    fn on_line(&mut self, line: &LogLine) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        tx.send(line.clone()).map_err(|_| SinkError::Closed)
    }

    fn finish(&mut self, _total: u64) -> Result<(), SinkError> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sinks_tests.rs"]
mod tests;
