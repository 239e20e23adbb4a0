//! # Field Kinds — The Closed Type Lattice
//!
//! Every field a schema can declare has exactly one `FieldKind`. The two
//! marshaling directions match on it exhaustively, so adding a kind forces
//! every encoder and decoder arm to be written before the workspace builds.
//!
//! Message and enum kinds carry the *qualified name* of the referenced type
//! rather than the descriptor itself. The name is resolved against a pool
//! snapshot at use time.

use std::fmt;
use std::str::FromStr;

use crate::wire::WireType;

/// The scalar kinds of the schema language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    /// 64-bit IEEE float, fixed width.
    Double,
    /// 32-bit IEEE float, fixed width.
    Float,
    /// Signed 32-bit, varint (negative values take ten bytes).
    Int32,
    /// Signed 64-bit, varint.
    Int64,
    /// Unsigned 32-bit, varint.
    UInt32,
    /// Unsigned 64-bit, varint.
    UInt64,
    /// Signed 32-bit, ZigZag varint.
    SInt32,
    /// Signed 64-bit, ZigZag varint.
    SInt64,
    /// Unsigned 32-bit, fixed width.
    Fixed32,
    /// Unsigned 64-bit, fixed width.
    Fixed64,
    /// Signed 32-bit, fixed width.
    SFixed32,
    /// Signed 64-bit, fixed width.
    SFixed64,
    /// Boolean, varint 0/1.
    Bool,
    /// UTF-8 text, length-delimited.
    String,
    /// Opaque octets, length-delimited.
    Bytes,
}

impl ScalarKind {
    /// All scalar kinds, in schema-language documentation order.
    pub fn all() -> &'static [ScalarKind] {
        &[
            Self::Double,
            Self::Float,
            Self::Int32,
            Self::Int64,
            Self::UInt32,
            Self::UInt64,
            Self::SInt32,
            Self::SInt64,
            Self::Fixed32,
            Self::Fixed64,
            Self::SFixed32,
            Self::SFixed64,
            Self::Bool,
            Self::String,
            Self::Bytes,
        ]
    }

    /// The keyword used for this kind in schema source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::SFixed32 => "sfixed32",
            Self::SFixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Wire type used for a single, unpacked value of this kind.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::UInt32
            | Self::UInt64
            | Self::SInt32
            | Self::SInt64
            | Self::Bool => WireType::Varint,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::SixtyFourBit,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::ThirtyTwoBit,
            Self::String | Self::Bytes => WireType::LengthDelimited,
        }
    }

    /// Whether repeated fields of this kind may use packed encoding.
    pub fn is_packable(&self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// Whether this kind may be the key of a map field.
    pub fn is_map_key(&self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bytes)
    }

    /// Whether values of this kind are integral.
    pub fn is_integral(&self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bool | Self::String | Self::Bytes)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown scalar kind: {s}"))
    }
}

/// The declared kind of a field.
///
/// `Repeated` never wraps `Repeated` or `Map`, and a `Map` key is always a
/// scalar for which [`ScalarKind::is_map_key`] holds. The schema linker
/// enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A scalar value.
    Scalar(ScalarKind),
    /// An enum value; carries the enum's qualified name.
    Enum(String),
    /// An embedded message; carries the message's qualified name.
    Message(String),
    /// A sequence of elements of the inner kind.
    Repeated(Box<FieldKind>),
    /// An associative field from a scalar key to the inner value kind.
    Map(ScalarKind, Box<FieldKind>),
}

impl FieldKind {
    /// Whether this is a repeated field.
    pub fn is_repeated(&self) -> bool {
        matches!(self, Self::Repeated(_))
    }

    /// Whether this is a map field.
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(..))
    }

    /// The referenced message or enum name, looking through `Repeated` and
    /// map values.
    pub fn type_ref(&self) -> Option<&str> {
        match self {
            Self::Scalar(_) => None,
            Self::Enum(name) | Self::Message(name) => Some(name),
            Self::Repeated(inner) | Self::Map(_, inner) => inner.type_ref(),
        }
    }

    /// Wire type of one occurrence of this kind, unpacked.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Scalar(k) => k.wire_type(),
            Self::Enum(_) => WireType::Varint,
            Self::Message(_) | Self::Map(..) => WireType::LengthDelimited,
            Self::Repeated(inner) => inner.wire_type(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(k) => write!(f, "{k}"),
            Self::Enum(name) => write!(f, "enum {name}"),
            Self::Message(name) => write!(f, "message {name}"),
            Self::Repeated(inner) => write!(f, "repeated {inner}"),
            Self::Map(key, value) => write!(f, "map<{key}, {value}>"),
        }
    }
}
