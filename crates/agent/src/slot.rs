// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's single execution slot.
//!
//! At most one command occupies the slot. Each occupation gets a fresh
//! generation number; a worker only acts on the slot while its generation
//! is still the current one, so a killed worker can never clear or report
//! over its successor.

use cix_core::CmdId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Live counters of the running command, shared with the worker.
#[derive(Debug, Default)]
pub struct Progress {
    /// 0 until the process is spawned
    pid: AtomicU32,
    lines: AtomicU64,
}

impl Progress {
    pub fn set_pid(&self, pid: u32) {
        self.pid.store(pid, Ordering::SeqCst);
    }

    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    pub fn add_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }
}

/// What occupies the slot.
#[derive(Debug)]
pub struct Occupant {
    pub cmd_id: CmdId,
    pub generation: u64,
    pub progress: Arc<Progress>,
    /// Set once the worker task is running
    abort: Option<AbortHandle>,
}

impl Occupant {
    /// Whether the worker had started; an unstarted occupant is still being
    /// accepted and its acceptor reports it.
    pub fn is_started(&self) -> bool {
        self.abort.is_some()
    }

    /// Abort the worker task, if it has one.
    pub fn abort(&self) {
        if let Some(handle) = &self.abort {
            handle.abort();
        }
    }
}

/// Ticket handed to whoever occupied the slot.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub generation: u64,
    pub progress: Arc<Progress>,
}

#[derive(Debug, Default)]
pub struct Slot {
    current: Mutex<Option<Occupant>>,
    generations: AtomicU64,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy the slot for `cmd_id` if it is free.
    pub fn try_occupy(&self, cmd_id: &CmdId) -> Option<Ticket> {
        let mut current = self.current.lock();
        if current.is_some() {
            return None;
        }
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let progress = Arc::new(Progress::default());
        *current = Some(Occupant {
            cmd_id: cmd_id.clone(),
            generation,
            progress: Arc::clone(&progress),
            abort: None,
        });
        Some(Ticket { generation, progress })
    }

    /// Record the worker task of `generation`. Returns false if the slot was
    /// taken away in the meantime.
    pub fn start(&self, generation: u64, abort: AbortHandle) -> bool {
        match self.current.lock().as_mut() {
            Some(occupant) if occupant.generation == generation => {
                occupant.abort = Some(abort);
                true
            }
            _ => false,
        }
    }

    /// Free the slot if `generation` still holds it.
    pub fn clear_if(&self, generation: u64) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|o| o.generation == generation) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Empty the slot unconditionally, returning what was in it.
    pub fn take(&self) -> Option<Occupant> {
        self.current.lock().take()
    }

    pub fn current(&self) -> Option<CmdId> {
        self.current.lock().as_ref().map(|o| o.cmd_id.clone())
    }

    pub fn is_free(&self) -> bool {
        self.current.lock().is_none()
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
