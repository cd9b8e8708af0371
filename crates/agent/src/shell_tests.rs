// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::SinkError;
use crate::fanout::LogSink;
use cix_core::CmdId;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Default)]
struct Lines(Arc<Mutex<Vec<String>>>);

impl LogSink for Lines {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn on_line(&mut self, line: &LogLine) -> Result<(), SinkError> {
        self.0.lock().push(line.content.clone());
        Ok(())
    }

    fn finish(&mut self, _total: u64) -> Result<(), SinkError> {
        Ok(())
    }
}

fn spec(dir: &std::path::Path, scripts: &[&str]) -> ShellSpec {
    ShellSpec {
        scripts: scripts.iter().map(|s| s.to_string()).collect(),
        env: VariableMap::new(),
        work_dir: dir.to_path_buf(),
        timeout: Duration::from_secs(30),
        env_filters: Vec::new(),
    }
}

async fn run(spec: &ShellSpec) -> (std::io::Result<ShellRun>, Vec<String>, Progress) {
    let lines = Lines::default();
    let mut fanout = LoggingFanout::new(CmdId::from("c1"));
    fanout.attach(lines.clone());
    let progress = Progress::default();
    let result = ShellRunner::new("bash").run(spec, &progress, &mut fanout).await;
    fanout.finish(progress.lines());
    let captured = lines.0.lock().clone();
    (result, captured, progress)
}

#[test]
fn script_wraps_lines_with_marker() {
    let text = ShellRunner::script(&["echo a".to_string(), "echo b".to_string()]);
    assert_eq!(text, format!("set -e\necho a\necho b\necho '{OUTPUT_MARKER}'\nenv\n"));
}

#[test]
fn capture_starts_at_marker() {
    let filters = vec!["X".to_string(), "FLOW_".to_string()];
    let mut capture = EnvCapture::new(&filters);
    assert!(!capture.feed("X=0"));
    assert!(capture.feed(OUTPUT_MARKER));
    assert!(capture.feed("X=1"));
    assert!(capture.feed("FLOW_OUT=a=b"));
    assert!(capture.feed("PATH=/bin"));
    assert!(capture.feed("no equals sign"));

    let expected: VariableMap =
        [("X".to_string(), "1".to_string()), ("FLOW_OUT".to_string(), "a=b".to_string())].into();
    assert_eq!(capture.output, expected);
}

#[tokio::test]
async fn captures_filtered_env_and_streams_both_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec(dir.path(), &["echo hello", "echo oops >&2", "export X=1"]);
    spec.env_filters = vec!["X".to_string()];

    let (result, lines, progress) = run(&spec).await;
    let run = result.unwrap();

    assert_eq!(run.outcome, ShellOutcome::Exited(0));
    assert_eq!(run.output.get("X").map(String::as_str), Some("1"));
    assert_eq!(run.output.len(), 1);
    assert!(lines.contains(&"hello".to_string()));
    assert!(lines.contains(&"oops".to_string()));
    assert!(!lines.iter().any(|l| l == OUTPUT_MARKER || l.starts_with("PATH=")));
    assert_eq!(run.lines, 2);
    assert_eq!(progress.lines(), 2);
    assert!(progress.pid().is_some());
}

#[yare::parameterized(
    explicit_exit = { &["exit 3"], 3 },
    set_e_stops_on_failure = { &["false", "echo after"], 1 },
)]
fn non_zero_exit_is_recorded(scripts: &[&str], code: i32) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (result, lines, _) = rt.block_on(run(&spec(dir.path(), scripts)));
    let run = result.unwrap();
    assert_eq!(run.outcome, ShellOutcome::Exited(code));
    assert!(run.output.is_empty());
    assert!(!lines.contains(&"after".to_string()));
}

#[tokio::test]
async fn inputs_are_exported() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec(dir.path(), &["echo \"$GREETING from $(pwd)\""]);
    spec.env.insert("GREETING".to_string(), "hi".to_string());

    let (result, lines, _) = run(&spec).await;
    assert_eq!(result.unwrap().outcome, ShellOutcome::Exited(0));
    let expected = format!("hi from {}", dir.path().canonicalize().unwrap().display());
    assert_eq!(lines, vec![expected]);
}

#[tokio::test]
async fn timeout_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec(dir.path(), &["echo started", "sleep 30"]);
    spec.timeout = Duration::from_millis(300);

    let started = std::time::Instant::now();
    let (result, _, _) = run(&spec).await;
    assert_eq!(result.unwrap().outcome, ShellOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn background_child_does_not_hold_the_run_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = spec(dir.path(), &["sleep 30 &", "echo done", "export X=1"]);
    spec.timeout = Duration::from_secs(3);
    spec.env_filters = vec!["X".to_string()];

    let started = std::time::Instant::now();
    let (result, lines, _) = run(&spec).await;
    let run = result.unwrap();
    assert_eq!(run.outcome, ShellOutcome::Exited(0));
    assert_eq!(lines, vec!["done".to_string()]);
    assert_eq!(run.output.get("X").map(String::as_str), Some("1"));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn signal_death_is_not_an_exit() {
    let dir = tempfile::tempdir().unwrap();
    let (result, _, _) = run(&spec(dir.path(), &["kill -9 $$"])).await;
    assert_eq!(result.unwrap().outcome, ShellOutcome::Signaled);
}

#[tokio::test]
async fn missing_work_dir_fails_to_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let spec = spec(&dir.path().join("missing"), &["true"]);
    let (result, lines, progress) = run(&spec).await;
    assert!(result.is_err());
    assert!(lines.is_empty());
    assert_eq!(progress.pid(), None);
}

#[test]
fn killing_a_vanished_group_is_quiet() {
    // Highest pid value is never a live process group here
    kill_group(i32::MAX as u32);
}
