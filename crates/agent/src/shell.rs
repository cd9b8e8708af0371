// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running a command's scripts as a shell process.
//!
//! The scripts run under `set -e` in their own process group. After the last
//! script the shell prints [`OUTPUT_MARKER`] and its environment; everything
//! after the marker is parsed for output variables instead of being logged.

use crate::fanout::LoggingFanout;
use crate::slot::Progress;
use cix_core::{LogLine, VariableMap};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Separates script output from the captured environment dump.
pub const OUTPUT_MARKER: &str = "::cix-output-env::";

/// How long output may keep flowing once the shell itself is gone
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ShellSpec {
    pub scripts: Vec<String>,
    /// Environment added on top of the agent's own
    pub env: VariableMap,
    pub work_dir: PathBuf,
    pub timeout: Duration,
    /// Prefixes of variables captured as output
    pub env_filters: Vec<String>,
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellOutcome {
    Exited(i32),
    /// Terminated by a signal
    Signaled,
    /// Killed by us after the timeout
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRun {
    pub outcome: ShellOutcome,
    pub output: VariableMap,
    /// Lines delivered to the fanout
    pub lines: u64,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Collects `KEY=VALUE` lines whose key matches a filter prefix.
struct EnvCapture<'a> {
    filters: &'a [String],
    active: bool,
    output: VariableMap,
}

impl<'a> EnvCapture<'a> {
    fn new(filters: &'a [String]) -> Self {
        Self { filters, active: false, output: VariableMap::new() }
    }

    /// Returns true if the line belongs to the capture and must not be logged.
    fn feed(&mut self, line: &str) -> bool {
        if !self.active {
            self.active = line == OUTPUT_MARKER;
            return self.active;
        }
        if let Some((key, value)) = line.split_once('=') {
            if self.filters.iter().any(|f| key.starts_with(f.as_str())) {
                self.output.insert(key.to_string(), value.to_string());
            }
        }
        true
    }
}

/// Spawns scripts under a shell program (`bash` by default).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
}

impl ShellRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    /// Full script text handed to the shell.
    pub fn script(scripts: &[String]) -> String {
        let mut text = String::from("set -e\n");
        for line in scripts {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(&format!("echo '{}'\nenv\n", OUTPUT_MARKER));
        text
    }

    /// Run to completion or timeout, streaming stdout and stderr lines into
    /// `fanout`. The pid is published through `progress` once spawned.
    ///
    /// Errors only when the process cannot be spawned or waited on.
    pub async fn run(
        &self,
        spec: &ShellSpec,
        progress: &Progress,
        fanout: &mut LoggingFanout,
    ) -> std::io::Result<ShellRun> {
        let mut child = tokio::process::Command::new(&self.program)
            .arg("-c")
            .arg(Self::script(&spec.scripts))
            .current_dir(&spec.work_dir)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        if let Some(pid) = pid {
            progress.set_pid(pid);
        }
        let cmd_id = fanout.cmd_id().clone();
        tracing::info!(%cmd_id, pid, work_dir = %spec.work_dir.display(), "process started");

        let (tx, mut rx) = mpsc::unbounded_channel::<(Stream, String)>();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut capture = EnvCapture::new(&spec.env_filters);

        let consume = async {
            while let Some((stream, text)) = rx.recv().await {
                if matches!(stream, Stream::Stdout) && capture.feed(&text) {
                    continue;
                }
                fanout.on_line(&LogLine::new(cmd_id.clone(), text));
                progress.add_line();
            }
        };

        let outcome = {
            let pump = async {
                tokio::join!(
                    read_lines(stdout, Stream::Stdout, tx.clone()),
                    read_lines(stderr, Stream::Stderr, tx),
                    consume,
                );
            };
            tokio::pin!(pump);
            let deadline = tokio::time::sleep(spec.timeout);
            tokio::pin!(deadline);

            // The shell's exit decides the outcome; a background process
            // may keep the pipes open long after that.
            let mut drained = false;
            let status = loop {
                tokio::select! {
                    status = child.wait() => break Some(status?),
                    () = &mut pump, if !drained => drained = true,
                    () = &mut deadline => break None,
                }
            };

            match status {
                Some(status) => {
                    if !drained && tokio::time::timeout(OUTPUT_DRAIN, &mut pump).await.is_err() {
                        tracing::debug!(%cmd_id, "output still held open after exit, killing group");
                        if let Some(pid) = pid {
                            kill_group(pid);
                        }
                        let _ = tokio::time::timeout(OUTPUT_DRAIN, &mut pump).await;
                    }
                    match status.code() {
                        Some(code) => ShellOutcome::Exited(code),
                        None => ShellOutcome::Signaled,
                    }
                }
                None => {
                    tracing::warn!(%cmd_id, timeout_secs = spec.timeout.as_secs(), "command timed out");
                    if let Some(pid) = pid {
                        kill_group(pid);
                    }
                    let _ = child.kill().await;
                    if !drained {
                        let _ = tokio::time::timeout(OUTPUT_DRAIN, &mut pump).await;
                    }
                    ShellOutcome::TimedOut
                }
            }
        };

        let lines = fanout.delivered();
        tracing::info!(%cmd_id, ?outcome, lines, "process finished");
        Ok(ShellRun { outcome, output: capture.output, lines })
    }
}

async fn read_lines<R>(reader: Option<R>, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else { return };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                if tx.send((stream, String::from_utf8_lossy(&buf).into_owned())).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(?stream, error = %e, "output read failed");
                break;
            }
        }
    }
}

/// SIGKILL the process group led by `pid`. A group that is already gone is
/// not an error.
pub fn kill_group(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else { return };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill process group"),
    }
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
