//! # dynproto-cli — Command-Line Interface
//!
//! Drives a [`ProtoHost`](dynproto_marshal::ProtoHost) from the shell:
//! load a schema tree, then encode, decode, pack or unpack one message
//! per invocation.
//!
//! ## Subcommands
//!
//! - `check`: load every configured schema and list the messages
//! - `exist`: whether a message name is loaded
//! - `create`: a default-initialized message as JSON
//! - `encode` / `decode`: JSON object to wire bytes and back
//! - `pack` / `unpack`: positional JSON values to wire bytes and back
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers here take parsed
//!   arguments and a writer.
//! - Handlers delegate to `dynproto-marshal`; no marshaling logic here.
//! - Payload goes to stdout, logs to stderr.

pub mod commands;
pub mod config;
