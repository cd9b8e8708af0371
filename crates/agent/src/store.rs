// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Received and executed command records.

use crate::error::StoreError;
use cix_core::{CmdId, ExecutedCmd, ReceivedCmd};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Store-by-id for command records.
pub trait CmdStore: Send + Sync + 'static {
    fn save_received(&self, received: ReceivedCmd) -> Result<(), StoreError>;

    fn get_received(&self, id: &CmdId) -> Result<Option<ReceivedCmd>, StoreError>;

    /// All received commands, newest first.
    fn list_received(&self) -> Result<Vec<ReceivedCmd>, StoreError>;

    /// Save a report, merging with any earlier one for the same command by
    /// status level. Returns the record now stored.
    fn save_executed(&self, executed: ExecutedCmd) -> Result<ExecutedCmd, StoreError>;

    /// Start a fresh record for a new run of the command, discarding the
    /// outcome of any earlier run with the same id.
    fn reset_executed(&self, executed: ExecutedCmd) -> Result<(), StoreError>;

    fn get_executed(&self, id: &CmdId) -> Result<Option<ExecutedCmd>, StoreError>;

    /// All executed records, most recently started first.
    fn list_executed(&self) -> Result<Vec<ExecutedCmd>, StoreError>;
}

#[derive(Default)]
struct Records {
    received: HashMap<CmdId, ReceivedCmd>,
    executed: HashMap<CmdId, ExecutedCmd>,
}

/// In-memory [`CmdStore`].
#[derive(Default)]
pub struct MemoryCmdStore {
    inner: Mutex<Records>,
}

impl MemoryCmdStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CmdStore for MemoryCmdStore {
    fn save_received(&self, received: ReceivedCmd) -> Result<(), StoreError> {
        self.inner.lock().received.insert(received.cmd.id.clone(), received);
        Ok(())
    }

    fn get_received(&self, id: &CmdId) -> Result<Option<ReceivedCmd>, StoreError> {
        Ok(self.inner.lock().received.get(id).cloned())
    }

    fn list_received(&self) -> Result<Vec<ReceivedCmd>, StoreError> {
        let mut all: Vec<ReceivedCmd> = self.inner.lock().received.values().cloned().collect();
        all.sort_by_key(|r| Reverse(r.received_at_ms));
        Ok(all)
    }

    fn save_executed(&self, executed: ExecutedCmd) -> Result<ExecutedCmd, StoreError> {
        let mut inner = self.inner.lock();
        let stored = match inner.executed.remove(&executed.id) {
            Some(mut current) => {
                if !current.merge_from(executed) {
                    tracing::debug!(cmd_id = %current.id, status = %current.status(), "stale report ignored");
                }
                current
            }
            None => executed,
        };
        inner.executed.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn reset_executed(&self, executed: ExecutedCmd) -> Result<(), StoreError> {
        self.inner.lock().executed.insert(executed.id.clone(), executed);
        Ok(())
    }

    fn get_executed(&self, id: &CmdId) -> Result<Option<ExecutedCmd>, StoreError> {
        Ok(self.inner.lock().executed.get(id).cloned())
    }

    fn list_executed(&self) -> Result<Vec<ExecutedCmd>, StoreError> {
        let mut all: Vec<ExecutedCmd> = self.inner.lock().executed.values().cloned().collect();
        all.sort_by_key(|e| Reverse(e.start_at));
        Ok(all)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
