// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease-based node store.
//!
//! A small coordination service: clients open sessions that stay alive as
//! long as they keep renewing them, and may own ephemeral nodes that vanish
//! with the session. Nodes carry a creation sequence number (`czxid`) and a
//! data version so callers can order creations and do compare-and-set.
//!
//! Expired sessions are reaped lazily at the start of every operation (and by
//! [`LeaseStore::spawn_reaper`]); time comes from a [`Clock`] so tests expire
//! sessions by advancing a fake clock.

use crate::error::LeaseError;
use cix_core::Clock;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 256;

/// Identifier of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Whether a node outlives its creator's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
}

/// Node metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Store sequence number at creation; later creations compare greater
    pub czxid: u64,
    /// Store sequence number of the last write
    pub mzxid: u64,
    /// Data version, bumped on every set
    pub version: u64,
    pub ephemeral_owner: Option<SessionId>,
}

/// Change notification for a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub path: String,
    pub kind: NodeEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventKind {
    Created,
    DataChanged,
    Deleted,
}

cix_core::simple_display! {
    NodeEventKind {
        Created => "created",
        DataChanged => "data_changed",
        Deleted => "deleted",
    }
}

struct Node {
    data: Vec<u8>,
    stat: Stat,
}

struct Session {
    ttl: Duration,
    expires_at: Instant,
}

struct State {
    nodes: BTreeMap<String, Node>,
    sessions: HashMap<SessionId, Session>,
    zxid: u64,
    next_session: u64,
    available: bool,
}

impl State {
    fn next_zxid(&mut self) -> u64 {
        self.zxid += 1;
        self.zxid
    }

    /// Drop expired sessions and their ephemeral nodes.
    fn reap(&mut self, now: Instant, events: &mut Vec<NodeEvent>) {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            tracing::info!(session = %id, "session expired");
            self.end_session(id, events);
        }
    }

    fn end_session(&mut self, id: SessionId, events: &mut Vec<NodeEvent>) {
        self.sessions.remove(&id);
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.stat.ephemeral_owner == Some(id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            self.nodes.remove(&path);
            self.zxid += 1;
            events.push(NodeEvent { path, kind: NodeEventKind::Deleted });
        }
    }

    fn check_session(&self, id: SessionId) -> Result<(), LeaseError> {
        if self.sessions.contains_key(&id) {
            Ok(())
        } else {
            Err(LeaseError::SessionExpired(id))
        }
    }

    fn check_version(path: &str, node: &Node, expected: Option<u64>) -> Result<(), LeaseError> {
        match expected {
            Some(expected) if expected != node.stat.version => Err(LeaseError::BadVersion {
                path: path.to_string(),
                expected,
                actual: node.stat.version,
            }),
            _ => Ok(()),
        }
    }
}

/// In-process coordination service shared by all sessions.
#[derive(Clone)]
pub struct LeaseStore<C: Clock> {
    state: Arc<Mutex<State>>,
    events: broadcast::Sender<NodeEvent>,
    clock: C,
}

impl<C: Clock> LeaseStore<C> {
    pub fn new(clock: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = State {
            nodes: BTreeMap::new(),
            sessions: HashMap::new(),
            zxid: 0,
            next_session: 1,
            available: true,
        };
        Self { state: Arc::new(Mutex::new(state)), events, clock }
    }

    /// Open a session that expires `ttl` after its last keep-alive.
    pub fn connect(&self, ttl: Duration) -> Result<LeaseSession<C>, LeaseError> {
        let id = self.with_state(|state| {
            let id = SessionId(state.next_session);
            state.next_session += 1;
            state.sessions.insert(id, Session { ttl, expires_at: self.clock.now() + ttl });
            Ok(id)
        })?;
        tracing::debug!(session = %id, ttl_ms = ttl.as_millis() as u64, "session opened");
        Ok(LeaseSession { store: self.clone(), id })
    }

    /// Simulate the service becoming unreachable (every call fails with
    /// [`LeaseError::Unavailable`]) or reachable again.
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Reap expired sessions now.
    pub fn tick(&self) {
        let _ = self.with_state(|_| Ok(()));
    }

    pub fn is_alive(&self, id: SessionId) -> bool {
        self.with_state(|state| Ok(state.sessions.contains_key(&id))).unwrap_or(false)
    }

    /// Reap expired sessions every `interval` until the returned task is aborted.
    pub fn spawn_reaper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.tick();
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Run `f` after the availability check and reaping, then publish the
    /// collected events once the lock is released.
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, LeaseError>,
    ) -> Result<T, LeaseError> {
        self.mutate(|state, _| f(state))
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut State, &mut Vec<NodeEvent>) -> Result<T, LeaseError>,
    ) -> Result<T, LeaseError> {
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            if !state.available {
                return Err(LeaseError::Unavailable);
            }
            state.reap(self.clock.now(), &mut events);
            f(&mut state, &mut events)
        };
        for event in events {
            // No receivers is fine
            let _ = self.events.send(event);
        }
        result
    }

    fn create(
        &self,
        session: SessionId,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<Stat, LeaseError> {
        self.mutate(|state, events| {
            state.check_session(session)?;
            if state.nodes.contains_key(path) {
                return Err(LeaseError::NodeExists(path.to_string()));
            }
            let zxid = state.next_zxid();
            let stat = Stat {
                czxid: zxid,
                mzxid: zxid,
                version: 0,
                ephemeral_owner: match mode {
                    CreateMode::Ephemeral => Some(session),
                    CreateMode::Persistent => None,
                },
            };
            state.nodes.insert(path.to_string(), Node { data, stat: stat.clone() });
            events.push(NodeEvent { path: path.to_string(), kind: NodeEventKind::Created });
            Ok(stat)
        })
    }

    fn get(&self, session: SessionId, path: &str) -> Result<Option<(Vec<u8>, Stat)>, LeaseError> {
        self.with_state(|state| {
            state.check_session(session)?;
            Ok(state.nodes.get(path).map(|node| (node.data.clone(), node.stat.clone())))
        })
    }

    fn set(
        &self,
        session: SessionId,
        path: &str,
        data: Vec<u8>,
        expected: Option<u64>,
    ) -> Result<Stat, LeaseError> {
        self.mutate(|state, events| {
            state.check_session(session)?;
            let zxid = state.zxid + 1;
            let node =
                state.nodes.get_mut(path).ok_or_else(|| LeaseError::NoNode(path.to_string()))?;
            State::check_version(path, node, expected)?;
            node.data = data;
            node.stat.version += 1;
            node.stat.mzxid = zxid;
            let stat = node.stat.clone();
            state.zxid = zxid;
            events.push(NodeEvent { path: path.to_string(), kind: NodeEventKind::DataChanged });
            Ok(stat)
        })
    }

    fn delete(&self, session: SessionId, path: &str, expected: Option<u64>) -> Result<(), LeaseError> {
        self.mutate(|state, events| {
            state.check_session(session)?;
            let node = state.nodes.get(path).ok_or_else(|| LeaseError::NoNode(path.to_string()))?;
            State::check_version(path, node, expected)?;
            state.nodes.remove(path);
            state.zxid += 1;
            events.push(NodeEvent { path: path.to_string(), kind: NodeEventKind::Deleted });
            Ok(())
        })
    }

    fn children(&self, session: SessionId, parent: &str) -> Result<Vec<String>, LeaseError> {
        let prefix = format!("{}/", parent.trim_end_matches('/'));
        self.with_state(|state| {
            state.check_session(session)?;
            Ok(state
                .nodes
                .range(prefix.clone()..)
                .take_while(|(path, _)| path.starts_with(&prefix))
                .filter_map(|(path, _)| {
                    let name = &path[prefix.len()..];
                    (!name.contains('/')).then(|| name.to_string())
                })
                .collect())
        })
    }

    fn keep_alive(&self, session: SessionId) -> Result<(), LeaseError> {
        let now = self.clock.now();
        self.with_state(|state| {
            let entry =
                state.sessions.get_mut(&session).ok_or(LeaseError::SessionExpired(session))?;
            entry.expires_at = now + entry.ttl;
            Ok(())
        })
    }

    fn close(&self, session: SessionId) -> Result<(), LeaseError> {
        self.mutate(|state, events| {
            state.check_session(session)?;
            state.end_session(session, events);
            Ok(())
        })?;
        tracing::debug!(session = %session, "session closed");
        Ok(())
    }
}

/// Client handle bound to one session.
///
/// Cloning shares the session; it ends when the TTL lapses without a
/// keep-alive or on [`LeaseSession::close`].
#[derive(Clone)]
pub struct LeaseSession<C: Clock> {
    store: LeaseStore<C>,
    id: SessionId,
}

impl<C: Clock> LeaseSession<C> {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn store(&self) -> &LeaseStore<C> {
        &self.store
    }

    pub fn is_alive(&self) -> bool {
        self.store.is_alive(self.id)
    }

    pub fn create(&self, path: &str, data: Vec<u8>, mode: CreateMode) -> Result<Stat, LeaseError> {
        self.store.create(self.id, path, data, mode)
    }

    pub fn get(&self, path: &str) -> Result<Option<(Vec<u8>, Stat)>, LeaseError> {
        self.store.get(self.id, path)
    }

    /// Overwrite data, optionally only if the node is still at `expected` version.
    pub fn set(&self, path: &str, data: Vec<u8>, expected: Option<u64>) -> Result<Stat, LeaseError> {
        self.store.set(self.id, path, data, expected)
    }

    pub fn delete(&self, path: &str, expected: Option<u64>) -> Result<(), LeaseError> {
        self.store.delete(self.id, path, expected)
    }

    /// Names of the direct children of `parent`, sorted.
    pub fn children(&self, parent: &str) -> Result<Vec<String>, LeaseError> {
        self.store.children(self.id, parent)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.store.subscribe()
    }

    pub fn keep_alive(&self) -> Result<(), LeaseError> {
        self.store.keep_alive(self.id)
    }

    /// End the session now, deleting its ephemeral nodes.
    pub fn close(&self) -> Result<(), LeaseError> {
        self.store.close(self.id)
    }

    /// Renew the session every `interval` until it expires or the task is aborted.
    ///
    /// Transient failures are retried on the next tick.
    pub fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match session.keep_alive() {
                    Ok(()) => {}
                    Err(LeaseError::SessionExpired(id)) => {
                        tracing::warn!(session = %id, "heartbeat stopped: session expired");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(session = %session.id, error = %e, "keep-alive failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
