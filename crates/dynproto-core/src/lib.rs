//! # dynproto-core — Foundational Types
//!
//! This crate is the leaf of the dynproto crate DAG. It defines the types
//! every other crate exchanges: the dynamic value a scripting host hands
//! in and gets back, the closed set of field kinds a schema can declare,
//! the immutable descriptors a registry publishes, and the binary wire
//! codec the marshalers drive.
//!
//! ## Key Design Principles
//!
//! 1. **One closed `FieldKind` enum.** Scalar, enum, message, repeated and
//!    map fields are arms of a single tagged variant. Both marshaling
//!    directions match on it exhaustively, so a new kind cannot be
//!    silently ignored by either side.
//!
//! 2. **Names, not pointers, between descriptors.** A message field that
//!    refers to another message or enum stores the qualified name. The
//!    reference is resolved against whatever pool snapshot the caller
//!    holds, so a reload never leaves a descriptor pointing into a
//!    discarded pool.
//!
//! 3. **Descriptors are immutable once built.** Nothing in this crate hands
//!    out `&mut` access to a published descriptor.
//!
//! 4. **Bounds-checked decoding.** `WireReader` never indexes past its
//!    buffer; every malformed input surfaces as a `WireError`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dynproto-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod descriptor;
pub mod error;
pub mod kind;
pub mod value;
pub mod wire;

// Re-export primary types for ergonomic imports.
pub use descriptor::{EnumDescriptor, FieldDescriptor, Presence, SchemaDescriptor, Syntax};
pub use error::{DynprotoError, ErrorKind, MarshalError, ParseError, WireError};
pub use kind::{FieldKind, ScalarKind};
pub use value::{DynamicValue, MapKey};
pub use wire::{wire_type_id, WireReader, WireType, WireWriter};
