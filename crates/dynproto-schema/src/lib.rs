//! # dynproto-schema — Schema Registry
//!
//! Turns `.proto` source files into a linked, queryable
//! [`DescriptorPool`] and keeps it current.
//!
//! ## Pipeline
//!
//! - [`path`]: virtual-to-real path mapping, so hosts can address schema
//!   files by a stable logical name wherever they live on disk.
//! - [`source`]: where text is read from once a path is resolved (disk by
//!   default, or an in-memory tree).
//! - `lexer` / [`parser`]: proto2 and proto3 source to an unlinked syntax
//!   tree, with file, line and column on every syntax error.
//! - [`pool`]: recursive import loading with cycle detection, then
//!   two-phase name registration and type linking.
//! - [`registry`]: the published pool behind an atomic pointer swap, with
//!   `parse` for incremental loads and `reload` for a full rebuild.
//!
//! ## Crate Policy
//!
//! - Depends only on `dynproto-core` internally.
//! - A failed `parse` or `reload` never publishes a partial pool.
//! - Readers never block: every lookup goes through one `Arc` snapshot.

mod lexer;
pub mod parser;
pub mod path;
pub mod pool;
pub mod registry;
pub mod source;

pub use path::{PathMapping, VirtualPathMap};
pub use pool::{DescriptorPool, FileEntry, PoolBuilder, MAX_SOURCE_SIZE};
pub use registry::SchemaRegistry;
pub use source::{DiskSourceTree, MemorySourceTree, SourceTree};
