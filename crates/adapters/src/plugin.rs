// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin resolution.
//!
//! Plugins are synchronized onto the agent by something else; the agent only
//! needs to find the local copy before it runs a command that uses one.

use async_trait::async_trait;
use cix_core::PluginRef;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from plugin resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("plugin {0} not found")]
    NotFound(PluginRef),
    #[error("plugin {plugin}: {message}")]
    Io { plugin: PluginRef, message: String },
}

/// Locates plugin directories by name and version
#[async_trait]
pub trait PluginResolver: Clone + Send + Sync + 'static {
    /// Directory holding the plugin's files.
    async fn resolve(&self, plugin: &PluginRef) -> Result<PathBuf, ResolveError>;

    /// Root directory all plugins live under
    fn root(&self) -> PathBuf;
}

/// Resolves plugins laid out as `{root}/{name}/{version}`.
#[derive(Clone, Debug)]
pub struct DirPluginResolver {
    root: PathBuf,
}

impl DirPluginResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn plugin_dir(&self, plugin: &PluginRef) -> PathBuf {
        self.root.join(&plugin.name).join(&plugin.version)
    }
}

#[async_trait]
impl PluginResolver for DirPluginResolver {
    async fn resolve(&self, plugin: &PluginRef) -> Result<PathBuf, ResolveError> {
        let dir = self.plugin_dir(plugin);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(ResolveError::NotFound(plugin.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(plugin.clone()))
            }
            Err(e) => Err(ResolveError::Io { plugin: plugin.clone(), message: e.to_string() }),
        }
    }

    fn root(&self) -> PathBuf {
        self.root.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{PluginResolver, ResolveError};
    use async_trait::async_trait;
    use cix_core::PluginRef;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeResolverState {
        available: HashSet<PluginRef>,
        calls: Vec<PluginRef>,
    }

    /// In-memory plugin resolver for testing
    #[derive(Clone, Default)]
    pub struct FakePluginResolver {
        inner: Arc<Mutex<FakeResolverState>>,
    }

    impl FakePluginResolver {
        pub const ROOT: &'static str = "/fake/plugins";

        pub fn new() -> Self {
            Self::default()
        }

        /// Make `name@version` resolvable
        pub fn with_plugin(self, name: &str, version: &str) -> Self {
            self.inner.lock().available.insert(PluginRef::new(name, version));
            self
        }

        /// Every plugin asked for, in order
        pub fn calls(&self) -> Vec<PluginRef> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl PluginResolver for FakePluginResolver {
        async fn resolve(&self, plugin: &PluginRef) -> Result<PathBuf, ResolveError> {
            let mut inner = self.inner.lock();
            inner.calls.push(plugin.clone());
            if inner.available.contains(plugin) {
                Ok(PathBuf::from(Self::ROOT).join(&plugin.name).join(&plugin.version))
            } else {
                Err(ResolveError::NotFound(plugin.clone()))
            }
        }

        fn root(&self) -> PathBuf {
            PathBuf::from(Self::ROOT)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePluginResolver;

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
