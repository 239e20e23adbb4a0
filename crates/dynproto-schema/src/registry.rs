//! # Schema Registry — Load, Query, Hot-Reload
//!
//! The registry owns the current [`DescriptorPool`] behind an
//! [`ArcSwap`]. Readers call [`SchemaRegistry::snapshot`] and get an
//! `Arc` to a pool that will never change under them; a marshaling call
//! takes one snapshot and uses it for its whole duration.
//!
//! Writers (`parse`, `reload`, `map_path`) are serialized by one mutex
//! that also guards the path map and the remembered root files. A writer
//! builds a complete new pool off to the side and publishes it with a
//! single `store`. If building fails, nothing is published and the
//! previous pool stays in service.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dynproto_core::ParseError;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::path::VirtualPathMap;
use crate::pool::{DescriptorPool, PoolBuilder};
use crate::source::{DiskSourceTree, SourceTree};

#[derive(Debug, Default)]
struct RegistryState {
    paths: VirtualPathMap,
    /// Files passed to a successful `parse`, in first-parse order.
    roots: Vec<String>,
}

/// Thread-safe schema registry.
#[derive(Debug)]
pub struct SchemaRegistry {
    pool: ArcSwap<DescriptorPool>,
    state: Mutex<RegistryState>,
    source: Arc<dyn SourceTree>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// An empty registry reading schema files from disk.
    pub fn new() -> Self {
        Self::with_source_tree(Arc::new(DiskSourceTree))
    }

    /// An empty registry reading schema files from `source`.
    pub fn with_source_tree(source: Arc<dyn SourceTree>) -> Self {
        Self {
            pool: ArcSwap::from_pointee(DescriptorPool::new()),
            state: Mutex::new(RegistryState::default()),
            source,
        }
    }

    /// Register a virtual prefix. Affects later `parse` and `reload` calls.
    pub fn map_path(&self, virtual_prefix: &str, real_dir: &str) {
        self.state.lock().paths.map_path(virtual_prefix, real_dir);
        debug!(virtual_prefix, real_dir, "path mapping registered");
    }

    /// The real path `virtual_path` currently resolves to.
    pub fn resolve(&self, virtual_path: &str) -> String {
        self.state.lock().paths.resolve(virtual_path)
    }

    /// A copy of the current path map.
    pub fn paths(&self) -> VirtualPathMap {
        self.state.lock().paths.clone()
    }

    /// Load `path` and its imports into the pool.
    ///
    /// A file that is already loaded is a successful no-op. On success the
    /// path is remembered for [`reload`](Self::reload); on failure the pool
    /// and the remembered set are unchanged.
    pub fn parse(&self, path: &str) -> Result<(), ParseError> {
        let mut state = self.state.lock();
        let current = self.pool.load_full();

        if current.contains_file(path) {
            debug!(file = path, "schema file already loaded");
        } else {
            let mut builder = PoolBuilder::new(DescriptorPool::clone(&current), &state.paths, self.source.as_ref());
            builder.load(path)?;
            let pool = builder.finish()?;
            debug!(file = path, schemas = pool.len(), "schema file parsed");
            self.pool.store(Arc::new(pool));
        }

        if !state.roots.iter().any(|r| r == path) {
            state.roots.push(path.to_string());
        }
        Ok(())
    }

    /// Whether a message schema named `name` is loaded.
    pub fn exists(&self, name: &str) -> bool {
        self.pool.load().contains(name)
    }

    /// Rebuild the pool from every remembered file, re-reading sources.
    ///
    /// The new pool replaces the old one only if every file loads and
    /// links. With nothing remembered, the pool becomes empty.
    pub fn reload(&self) -> Result<(), ParseError> {
        let state = self.state.lock();
        let mut builder = PoolBuilder::new(DescriptorPool::new(), &state.paths, self.source.as_ref());
        for root in &state.roots {
            builder.load(root)?;
        }
        let pool = builder.finish()?;
        info!(files = pool.file_count(), schemas = pool.len(), "schema pool reloaded");
        self.pool.store(Arc::new(pool));
        Ok(())
    }

    /// The current pool.
    pub fn snapshot(&self) -> Arc<DescriptorPool> {
        self.pool.load_full()
    }

    /// Files passed to successful `parse` calls.
    pub fn roots(&self) -> Vec<String> {
        self.state.lock().roots.clone()
    }
}
