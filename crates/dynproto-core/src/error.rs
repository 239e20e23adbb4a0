//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types used throughout dynproto. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Every error names the schema (or file) and the operation it came from,
//!   so a host can log it without extra bookkeeping.
//! - No error is fatal. Each call is independently retryable and a failed
//!   `reload` leaves the previous pool in service.
//! - Skipping an unknown wire field is not an error and has no variant here.

use std::fmt;

use thiserror::Error;

/// The five failure classes a host call can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The qualified name is not in the pool.
    UnknownSchema,
    /// Schema source could not be located, read, parsed or linked.
    ParseError,
    /// A value is incompatible with the declared field kind.
    TypeMismatch,
    /// Wire bytes are truncated or structurally invalid.
    MalformedInput,
    /// More positional arguments than declared fields.
    ArityMismatch,
}

impl ErrorKind {
    /// Stable string identifier for logs and host-facing messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownSchema => "unknown_schema",
            Self::ParseError => "parse_error",
            Self::TypeMismatch => "type_mismatch",
            Self::MalformedInput => "malformed_input",
            Self::ArityMismatch => "arity_mismatch",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for dynproto.
#[derive(Error, Debug)]
pub enum DynprotoError {
    /// Schema loading or linking failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A marshaling call failed.
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

impl DynprotoError {
    /// Classify this error into one of the host-visible kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Marshal(e) => e.kind(),
        }
    }
}

/// Error while locating, reading, parsing or linking schema source.
#[derive(Error, Debug)]
pub enum ParseError {
    /// No candidate location for the file exists.
    #[error("schema file '{file}' not found (tried: {})", tried.join(", "))]
    NotFound {
        /// The path as given by the caller or the import directive.
        file: String,
        /// Every real path that was probed, in order.
        tried: Vec<String>,
    },

    /// The file exists but could not be read.
    #[error("cannot read schema file '{file}': {source}")]
    Io {
        /// Real path of the file.
        file: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file exceeds the source size limit.
    #[error("schema file '{file}' is too large: {size} bytes (max {limit} bytes)")]
    TooLarge {
        /// Real path of the file.
        file: String,
        /// Actual size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The source text does not match the schema grammar.
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        /// Virtual file name.
        file: String,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
        /// What the parser expected or rejected.
        message: String,
    },

    /// A file transitively imports itself.
    #[error("import cycle detected: {chain}")]
    ImportCycle {
        /// The import chain, joined with ` -> `.
        chain: String,
    },

    /// Two different files declare the same qualified name.
    #[error("'{name}' declared in '{new_file}' is already defined in '{existing_file}'")]
    DuplicateName {
        /// The clashing qualified name.
        name: String,
        /// File that declared it first.
        existing_file: String,
        /// File that tried to redeclare it.
        new_file: String,
    },

    /// A field refers to a type name that resolves to nothing.
    #[error("{file}: '{type_name}' referenced by '{field}' is not defined")]
    UnresolvedType {
        /// Virtual file name of the referencing message.
        file: String,
        /// Qualified field name, e.g. `pkg.Person.phones`.
        field: String,
        /// The unresolved name as written.
        type_name: String,
    },

    /// The source is grammatical but semantically invalid.
    #[error("{file}: {message}")]
    Invalid {
        /// Virtual file name.
        file: String,
        /// Description of the violation.
        message: String,
    },
}

/// Error raised by a marshaling operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarshalError {
    /// The qualified name is not in the pool.
    #[error("{op}: unknown schema '{name}'")]
    UnknownSchema {
        /// Requested qualified name.
        name: String,
        /// Operation that performed the lookup.
        op: &'static str,
    },

    /// A present value does not fit its declared kind.
    #[error("{op}: field '{schema}.{field}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Schema that declares the field.
        schema: String,
        /// Field name.
        field: String,
        /// Human-readable declared kind.
        expected: String,
        /// Description of the offending value.
        found: String,
        /// Operation in progress.
        op: &'static str,
    },

    /// Wire bytes are truncated or structurally invalid.
    #[error("{op}: malformed input for '{schema}': {reason}")]
    MalformedInput {
        /// Schema being decoded when the failure was hit.
        schema: String,
        /// What was wrong with the bytes.
        reason: String,
        /// Operation in progress.
        op: &'static str,
    },

    /// More positional values than declared fields.
    #[error("{op}: '{schema}' declares {declared} fields, got {given} values")]
    ArityMismatch {
        /// Target schema.
        schema: String,
        /// Number of declared fields.
        declared: usize,
        /// Number of supplied values.
        given: usize,
        /// Operation in progress.
        op: &'static str,
    },
}

impl MarshalError {
    /// Classify this error into one of the host-visible kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSchema { .. } => ErrorKind::UnknownSchema,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::ArityMismatch { .. } => ErrorKind::ArityMismatch,
        }
    }
}

/// Error from the primitive wire codec.
///
/// Offsets are byte positions within the buffer handed to the reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended inside a value.
    #[error("truncated input at offset {offset}")]
    Truncated {
        /// Offset where more bytes were needed.
        offset: usize,
    },

    /// A varint ran past ten bytes or overflowed 64 bits.
    #[error("varint overflow at offset {offset}")]
    VarintOverflow {
        /// Offset of the first byte of the varint.
        offset: usize,
    },

    /// The low three bits of a key name no known wire type.
    #[error("invalid wire type {wire_type} at offset {offset}")]
    InvalidWireType {
        /// Raw wire type bits.
        wire_type: u8,
        /// Offset of the key.
        offset: usize,
    },

    /// A key carries field number zero or one beyond the protobuf range.
    #[error("invalid field number {number} at offset {offset}")]
    InvalidFieldNumber {
        /// Decoded field number.
        number: u64,
        /// Offset of the key.
        offset: usize,
    },

    /// A length prefix exceeds the remaining bytes.
    #[error("length {len} at offset {offset} exceeds remaining {remaining} bytes")]
    LengthOverflow {
        /// Declared length.
        len: u64,
        /// Bytes left after the prefix.
        remaining: usize,
        /// Offset of the length prefix.
        offset: usize,
    },

    /// An end-group key without a matching start group, or a mismatched one.
    #[error("unmatched group end for field {number}")]
    UnmatchedGroup {
        /// Field number of the offending end-group key.
        number: u32,
    },

    /// A `string` value is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string's length prefix.
        offset: usize,
    },

    /// Groups nested beyond the skip limit.
    #[error("groups nested deeper than {limit}")]
    GroupTooDeep {
        /// Nesting limit that was hit.
        limit: usize,
    },
}
