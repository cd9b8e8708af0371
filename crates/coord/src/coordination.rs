// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract the coordinator needs from a coordination service session.

use crate::error::LeaseError;
use crate::lease::{CreateMode, LeaseSession, NodeEvent, SessionId, Stat};
use async_trait::async_trait;
use cix_core::Clock;
use tokio::sync::broadcast;

/// Session-scoped access to a hierarchical node store with ephemeral nodes,
/// create-if-absent and version-checked writes.
#[async_trait]
pub trait Coordination: Clone + Send + Sync + 'static {
    fn session_id(&self) -> SessionId;

    /// Create a node; fails with [`LeaseError::NodeExists`] if one is present.
    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> Result<Stat, LeaseError>;

    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, Stat)>, LeaseError>;

    async fn set(&self, path: &str, data: Vec<u8>, version: Option<u64>) -> Result<Stat, LeaseError>;

    async fn delete(&self, path: &str, version: Option<u64>) -> Result<(), LeaseError>;

    async fn children(&self, parent: &str) -> Result<Vec<String>, LeaseError>;

    /// Notifications for every node change in the store.
    fn subscribe(&self) -> broadcast::Receiver<NodeEvent>;
}

#[async_trait]
impl<C: Clock> Coordination for LeaseSession<C> {
    fn session_id(&self) -> SessionId {
        self.id()
    }

    async fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> Result<Stat, LeaseError> {
        LeaseSession::create(self, path, data, mode)
    }

    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, Stat)>, LeaseError> {
        LeaseSession::get(self, path)
    }

    async fn set(&self, path: &str, data: Vec<u8>, version: Option<u64>) -> Result<Stat, LeaseError> {
        LeaseSession::set(self, path, data, version)
    }

    async fn delete(&self, path: &str, version: Option<u64>) -> Result<(), LeaseError> {
        LeaseSession::delete(self, path, version)
    }

    async fn children(&self, parent: &str) -> Result<Vec<String>, LeaseError> {
        LeaseSession::children(self, parent)
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        LeaseSession::subscribe(self)
    }
}
