//! # dynproto-marshal — Schema-Driven Marshaling
//!
//! Converts between host values ([`DynamicValue`](dynproto_core::DynamicValue))
//! and protobuf wire bytes, driven entirely by descriptors loaded at run
//! time. Nothing here is generated from schemas ahead of time.
//!
//! ## Operations
//!
//! - [`factory`]: `create`, a default-initialized message.
//! - [`named`]: `encode` / `decode`, messages keyed by field name.
//! - [`positional`]: `pack` / `unpack`, field values as an ordered list in
//!   declaration order.
//! - [`host`]: [`ProtoHost`], the nine-call surface a scripting binding
//!   exposes, with failures logged instead of returned.
//!
//! All of them go through a [`Marshaler`], which binds one pool snapshot
//! and one [`MarshalConfig`] for the duration of a call.
//!
//! ## Crate Policy
//!
//! - No operation panics on host input or wire input.
//! - Encoding is strict about value kinds; decoding is lenient about
//!   unknown fields and missing ones.

mod coerce;
pub mod config;
mod decode;
mod encode;
pub mod factory;
pub mod host;
pub mod marshaler;
pub mod named;
pub mod positional;

pub use config::{MarshalConfig, DEFAULT_MAX_DEPTH};
pub use host::ProtoHost;
pub use marshaler::Marshaler;
