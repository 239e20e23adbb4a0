//! # Wire Codec — Protobuf Binary Encoding Primitives
//!
//! The byte-level layer the marshalers drive. A record on the wire is a
//! key varint `(field_number << 3) | wire_type` followed by a payload whose
//! extent the wire type alone determines. That self-description is what
//! lets a decoder skip fields it has no descriptor for.
//!
//! | Wire type         | Id | Payload |
//! |-------------------|----|---------|
//! | `Varint`          | 0  | base-128 varint, least significant group first |
//! | `SixtyFourBit`    | 1  | 8 bytes little-endian |
//! | `LengthDelimited` | 2  | varint length, then that many bytes |
//! | `StartGroup`      | 3  | records up to the matching `EndGroup` (legacy) |
//! | `EndGroup`        | 4  | none |
//! | `ThirtyTwoBit`    | 5  | 4 bytes little-endian |
//!
//! Varints, keys and the [`WireType`] enum come from `prost::encoding`;
//! this module adds the schema-free scalar layer on top of them:
//! [`put_scalar`] and [`WireReader::read_scalar`] are the "encode/decode a
//! scalar of kind K" capability, and everything above them is
//! schema-driven. [`WireReader`] is a bounds-checked cursor that turns
//! every failure into a [`WireError`] carrying the byte offset.

use bytes::{Buf, BufMut};
use prost::encoding::{decode_varint, encode_key, encode_varint, sint32, sint64, DecodeContext};
use prost::DecodeError;

pub use prost::encoding::WireType;

use crate::error::WireError;
use crate::kind::ScalarKind;

/// Largest field number the format permits (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = prost::encoding::MAX_TAG;

/// Longest varint the format permits.
const MAX_VARINT_LEN: usize = 10;

/// Nesting limit when skipping legacy groups.
const MAX_GROUP_DEPTH: usize = 64;

/// The three-bit id a key carries for `wire_type`.
pub fn wire_type_id(wire_type: WireType) -> u8 {
    wire_type as u8
}

/// Map a three-bit id back to a wire type.
pub fn wire_type_from_id(id: u8) -> Option<WireType> {
    match id {
        0 => Some(WireType::Varint),
        1 => Some(WireType::SixtyFourBit),
        2 => Some(WireType::LengthDelimited),
        3 => Some(WireType::StartGroup),
        4 => Some(WireType::EndGroup),
        5 => Some(WireType::ThirtyTwoBit),
        _ => None,
    }
}

/// A scalar payload, already narrowed to the width its kind demands.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
}

// prost only exposes ZigZag behind its tagged per-type encoders, and a
// packed run or map entry needs the bare payload.
fn zigzag32(n: i32) -> u64 {
    u64::from(((n << 1) ^ (n >> 31)) as u32)
}

fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Append-only buffer for wire records.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// An empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Append a base-128 varint.
    pub fn put_varint(&mut self, value: u64) {
        encode_varint(value, &mut self.buf);
    }

    /// Append a field key. `number` must lie in `1..=MAX_FIELD_NUMBER`.
    pub fn put_key(&mut self, number: u32, wire_type: WireType) {
        encode_key(number, wire_type, &mut self.buf);
    }

    /// Append four little-endian bytes.
    pub fn put_fixed32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Append eight little-endian bytes.
    pub fn put_fixed64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Append a length prefix followed by `bytes`.
    pub fn put_len_delimited(&mut self, bytes: &[u8]) {
        encode_varint(bytes.len() as u64, &mut self.buf);
        self.buf.put_slice(bytes);
    }
}

/// Append the payload of one scalar (no key).
///
/// The caller guarantees `value` has the variant `kind` narrows to; a
/// mismatched pairing is written using the value's own width.
pub fn put_scalar(w: &mut WireWriter, kind: ScalarKind, value: &ScalarValue) {
    match (kind, value) {
        (ScalarKind::SInt32, ScalarValue::I32(n)) => w.put_varint(zigzag32(*n)),
        (ScalarKind::SInt64, ScalarValue::I64(n)) => w.put_varint(zigzag64(*n)),
        (ScalarKind::SFixed32, ScalarValue::I32(n)) => w.put_fixed32(*n as u32),
        (ScalarKind::SFixed64, ScalarValue::I64(n)) => w.put_fixed64(*n as u64),
        (ScalarKind::Fixed32, ScalarValue::U32(n)) => w.put_fixed32(*n),
        (ScalarKind::Fixed64, ScalarValue::U64(n)) => w.put_fixed64(*n),
        // int32 sign-extends to 64 bits, so negatives take ten bytes.
        (_, ScalarValue::I32(n)) => w.put_varint(i64::from(*n) as u64),
        (_, ScalarValue::I64(n)) => w.put_varint(*n as u64),
        (_, ScalarValue::U32(n)) => w.put_varint(u64::from(*n)),
        (_, ScalarValue::U64(n)) => w.put_varint(*n),
        (_, ScalarValue::Bool(b)) => w.put_varint(u64::from(*b)),
        (_, ScalarValue::F32(x)) => w.put_fixed32(x.to_bits()),
        (_, ScalarValue::F64(x)) => w.put_fixed64(x.to_bits()),
        (_, ScalarValue::String(s)) => w.put_len_delimited(s.as_bytes()),
        (_, ScalarValue::Bytes(b)) => w.put_len_delimited(b),
    }
}

/// Bounds-checked cursor over a wire buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Offset of `buf[0]` within the outermost buffer, for error messages.
    base: usize,
}

impl<'a> WireReader<'a> {
    /// A reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, base: 0 }
    }

    /// A reader over a sub-slice that reports offsets relative to the
    /// outermost buffer.
    fn nested(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    /// True once every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Absolute offset of the cursor.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn rest(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or_default()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated { offset: self.base + self.buf.len() });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Run a prost varint decoder over the unread bytes and advance past
    /// what it consumed.
    fn decode_with<T>(
        &mut self,
        decode: impl FnOnce(&mut &'a [u8]) -> Result<T, DecodeError>,
    ) -> Result<T, WireError> {
        let start = self.offset();
        let mut rest = self.rest();
        let before = rest.len();
        match decode(&mut rest) {
            Ok(value) => {
                self.pos += before - rest.len();
                Ok(value)
            }
            Err(_) => Err(self.varint_error(start)),
        }
    }

    /// Classify a varint prost rejected: input that ends before a
    /// terminating byte is truncated, anything else overflows.
    fn varint_error(&self, start: usize) -> WireError {
        let rest = self.rest();
        let terminated = rest.iter().take(MAX_VARINT_LEN).any(|b| b & 0x80 == 0);
        if !terminated && rest.len() < MAX_VARINT_LEN {
            WireError::Truncated { offset: self.base + self.buf.len() }
        } else {
            WireError::VarintOverflow { offset: start }
        }
    }

    /// Read a base-128 varint.
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        self.decode_with(|buf| decode_varint(buf))
    }

    /// Read a field key and split it into number and wire type.
    pub fn read_key(&mut self) -> Result<(u32, WireType), WireError> {
        let offset = self.offset();
        let key = self.read_varint()?;
        let id = (key & 0x7) as u8;
        let wire_type = wire_type_from_id(id).ok_or(WireError::InvalidWireType { wire_type: id, offset })?;
        let number = key >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(WireError::InvalidFieldNumber { number, offset });
        }
        Ok((number as u32, wire_type))
    }

    /// Read four little-endian bytes.
    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        let mut b = self.take(4)?;
        Ok(b.get_u32_le())
    }

    /// Read eight little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        let mut b = self.take(8)?;
        Ok(b.get_u64_le())
    }

    /// Read a length prefix and return the payload it covers.
    pub fn read_len_delimited(&mut self) -> Result<&'a [u8], WireError> {
        let offset = self.offset();
        let len = self.read_varint()?;
        let remaining = self.remaining();
        if len > remaining as u64 {
            return Err(WireError::LengthOverflow { len, remaining, offset });
        }
        self.take(len as usize)
    }

    /// Read a length-delimited payload as a reader of its own.
    pub fn read_nested(&mut self) -> Result<WireReader<'a>, WireError> {
        let base = self.offset();
        let bytes = self.read_len_delimited()?;
        let prefix = self.offset() - base - bytes.len();
        Ok(WireReader::nested(bytes, base + prefix))
    }

    /// Read one scalar payload of `kind`, with the wire type already
    /// established by the caller.
    pub fn read_scalar(&mut self, kind: ScalarKind) -> Result<ScalarValue, WireError> {
        Ok(match kind {
            ScalarKind::Int32 => ScalarValue::I32(self.read_varint()? as i32),
            ScalarKind::Int64 => ScalarValue::I64(self.read_varint()? as i64),
            ScalarKind::UInt32 => ScalarValue::U32(self.read_varint()? as u32),
            ScalarKind::UInt64 => ScalarValue::U64(self.read_varint()?),
            ScalarKind::SInt32 => {
                let mut n = 0;
                self.decode_with(|buf| sint32::merge(WireType::Varint, &mut n, buf, DecodeContext::default()))?;
                ScalarValue::I32(n)
            }
            ScalarKind::SInt64 => {
                let mut n = 0;
                self.decode_with(|buf| sint64::merge(WireType::Varint, &mut n, buf, DecodeContext::default()))?;
                ScalarValue::I64(n)
            }
            ScalarKind::Bool => ScalarValue::Bool(self.read_varint()? != 0),
            ScalarKind::Fixed32 => ScalarValue::U32(self.read_fixed32()?),
            ScalarKind::Fixed64 => ScalarValue::U64(self.read_fixed64()?),
            ScalarKind::SFixed32 => ScalarValue::I32(self.read_fixed32()? as i32),
            ScalarKind::SFixed64 => ScalarValue::I64(self.read_fixed64()? as i64),
            ScalarKind::Float => ScalarValue::F32(f32::from_bits(self.read_fixed32()?)),
            ScalarKind::Double => ScalarValue::F64(f64::from_bits(self.read_fixed64()?)),
            ScalarKind::String => {
                let offset = self.offset();
                let bytes = self.read_len_delimited()?;
                let s = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 { offset })?;
                ScalarValue::String(s.to_owned())
            }
            ScalarKind::Bytes => ScalarValue::Bytes(self.read_len_delimited()?.to_vec()),
        })
    }

    /// Skip the payload of a record whose key has just been read.
    pub fn skip_field(&mut self, number: u32, wire_type: WireType) -> Result<(), WireError> {
        self.skip_at_depth(number, wire_type, 0)
    }

    fn skip_at_depth(
        &mut self,
        number: u32,
        wire_type: WireType,
        depth: usize,
    ) -> Result<(), WireError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::SixtyFourBit => {
                self.take(8)?;
            }
            WireType::ThirtyTwoBit => {
                self.take(4)?;
            }
            WireType::LengthDelimited => {
                self.read_len_delimited()?;
            }
            WireType::StartGroup => {
                if depth >= MAX_GROUP_DEPTH {
                    return Err(WireError::GroupTooDeep { limit: MAX_GROUP_DEPTH });
                }
                loop {
                    let (inner, inner_type) = self.read_key()?;
                    if inner_type == WireType::EndGroup {
                        if inner == number {
                            break;
                        }
                        return Err(WireError::UnmatchedGroup { number: inner });
                    }
                    self.skip_at_depth(inner, inner_type, depth + 1)?;
                }
            }
            WireType::EndGroup => return Err(WireError::UnmatchedGroup { number }),
        }
        Ok(())
    }
}
