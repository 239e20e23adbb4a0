//! # Source Trees
//!
//! Where schema text comes from once a path has been resolved. The
//! registry only ever talks to a [`SourceTree`]; the filesystem is the
//! default, and [`MemorySourceTree`] serves schema text embedded by the
//! host (or written by tests) without touching disk.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

/// A readable namespace of schema files addressed by real path.
pub trait SourceTree: Send + Sync + fmt::Debug {
    /// Whether a file exists at `real_path`.
    fn exists(&self, real_path: &str) -> bool;

    /// Read the whole file at `real_path` as UTF-8 text.
    fn read(&self, real_path: &str) -> io::Result<String>;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSourceTree;

impl SourceTree for DiskSourceTree {
    fn exists(&self, real_path: &str) -> bool {
        Path::new(real_path).is_file()
    }

    fn read(&self, real_path: &str) -> io::Result<String> {
        std::fs::read_to_string(real_path)
    }
}

/// An in-memory set of files.
///
/// Clones share the same storage, so a host can keep a handle and edit
/// files after handing the tree to a registry.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceTree {
    files: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, real_path: impl Into<String>, text: impl Into<String>) {
        self.files.write().insert(real_path.into(), text.into());
    }

    /// Remove a file, returning its text.
    pub fn remove(&self, real_path: &str) -> Option<String> {
        self.files.write().remove(real_path)
    }
}

impl SourceTree for MemorySourceTree {
    fn exists(&self, real_path: &str) -> bool {
        self.files.read().contains_key(real_path)
    }

    fn read(&self, real_path: &str) -> io::Result<String> {
        self.files.read().get(real_path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {real_path}"))
        })
    }
}
