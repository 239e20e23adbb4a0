//! # Decoder — Wire Bytes to Host Values
//!
//! Shared by named `decode` and positional `unpack`. The decoder produces
//! one value per declared field, in declaration order; the callers only
//! choose whether to key them by name.
//!
//! ## Rules
//!
//! - Unknown field numbers are skipped, whatever their wire type.
//! - A known field arriving with the wrong wire type is malformed input.
//! - A later occurrence of a singular scalar replaces the earlier one.
//!   Occurrences of a singular message merge, which falls out of decoding
//!   the concatenation of their payloads.
//! - Repeated scalars are accepted packed and unpacked, in any mix.
//! - Fields missing from the input take the value `create` would give
//!   them: declared defaults, and default-constructed embedded messages.
//!   A message type already being decoded further up the path is `Nil`.

use std::cell::RefCell;
use std::collections::BTreeMap;

use dynproto_core::{
    DynamicValue, FieldDescriptor, FieldKind, MapKey, MarshalError, ScalarKind, SchemaDescriptor, WireError,
    WireReader, WireType,
};
use dynproto_core::wire_type_id;
use dynproto_schema::DescriptorPool;
use indexmap::IndexMap;
use tracing::debug;

use crate::coerce;
use crate::config::MarshalConfig;
use crate::factory::default_field;
use crate::marshaler::{enum_value, lookup_schema};

/// Decoding state of one field.
enum Slot<'b> {
    Absent,
    Value(DynamicValue),
    /// Payloads of a singular message field, merged on completion.
    Chunks(Vec<&'b [u8]>),
}

pub(crate) struct Decoder<'a> {
    pool: &'a DescriptorPool,
    config: &'a MarshalConfig,
    op: &'static str,
    /// Qualified names of the messages being decoded, outermost first.
    path: RefCell<Vec<String>>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(pool: &'a DescriptorPool, config: &'a MarshalConfig, op: &'static str) -> Self {
        Self { pool, config, op, path: RefCell::new(Vec::new()) }
    }

    /// Decode a message body into a name-keyed message value.
    pub(crate) fn message(
        &self,
        schema: &SchemaDescriptor,
        bytes: &[u8],
        depth: usize,
    ) -> Result<DynamicValue, MarshalError> {
        let values = self.fields(schema, bytes, depth)?;
        let fields: IndexMap<String, DynamicValue> =
            schema.fields().iter().map(|f| f.name.clone()).zip(values).collect();
        Ok(DynamicValue::Message(fields))
    }

    /// Decode a message body into one value per field, in declaration order.
    pub(crate) fn fields(
        &self,
        schema: &SchemaDescriptor,
        bytes: &[u8],
        depth: usize,
    ) -> Result<Vec<DynamicValue>, MarshalError> {
        self.path.borrow_mut().push(schema.qualified_name().to_string());
        let values = self.read_fields(schema, bytes, depth);
        self.path.borrow_mut().pop();
        values
    }

    fn read_fields(
        &self,
        schema: &SchemaDescriptor,
        bytes: &[u8],
        depth: usize,
    ) -> Result<Vec<DynamicValue>, MarshalError> {
        if depth > self.config.max_depth {
            return Err(self.malformed(
                schema,
                format!("message nesting exceeds max_depth {}", self.config.max_depth),
            ));
        }

        let mut slots: Vec<Slot<'_>> = schema.fields().iter().map(|_| Slot::Absent).collect();
        let mut r = WireReader::new(bytes);
        while !r.is_at_end() {
            let (number, wire_type) = r.read_key().map_err(|e| self.wire(schema, e))?;
            let Some(field) = schema.field_by_number(number) else {
                r.skip_field(number, wire_type).map_err(|e| self.wire(schema, e))?;
                debug!(schema = schema.qualified_name(), number, "skipped unknown field");
                continue;
            };
            let slot = &mut slots[field.declaration_index];
            self.read_field(schema, field, wire_type, &mut r, slot, depth)?;
        }

        slots
            .into_iter()
            .zip(schema.fields())
            .map(|(slot, field)| self.finish(schema, field, slot, depth))
            .collect()
    }

    fn read_field<'b>(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        wire_type: WireType,
        r: &mut WireReader<'b>,
        slot: &mut Slot<'b>,
        depth: usize,
    ) -> Result<(), MarshalError> {
        match &field.kind {
            FieldKind::Message(_) => {
                self.expect_wire(schema, field, wire_type, WireType::LengthDelimited)?;
                let chunk = r.read_len_delimited().map_err(|e| self.wire(schema, e))?;
                match slot {
                    Slot::Chunks(chunks) => chunks.push(chunk),
                    _ => *slot = Slot::Chunks(vec![chunk]),
                }
            }
            FieldKind::Repeated(inner) => {
                let mut items = match std::mem::replace(slot, Slot::Absent) {
                    Slot::Value(DynamicValue::List(items)) => items,
                    _ => Vec::new(),
                };
                match packed_wire_type(inner) {
                    Some(element_wire) if wire_type == WireType::LengthDelimited => {
                        let mut packed = r.read_nested().map_err(|e| self.wire(schema, e))?;
                        while !packed.is_at_end() {
                            items.push(self.read_single(schema, field, inner, element_wire, &mut packed, depth)?);
                        }
                    }
                    _ => items.push(self.read_single(schema, field, inner, wire_type, r, depth)?),
                }
                *slot = Slot::Value(DynamicValue::List(items));
            }
            FieldKind::Map(key_kind, value_kind) => {
                self.expect_wire(schema, field, wire_type, WireType::LengthDelimited)?;
                let entry = r.read_len_delimited().map_err(|e| self.wire(schema, e))?;
                let (key, value) = self.map_entry(schema, field, *key_kind, value_kind, entry, depth)?;
                match slot {
                    Slot::Value(DynamicValue::Map(entries)) => {
                        entries.insert(key, value);
                    }
                    _ => *slot = Slot::Value(DynamicValue::Map(BTreeMap::from([(key, value)]))),
                }
            }
            kind => {
                let value = self.read_single(schema, field, kind, wire_type, r, depth)?;
                *slot = Slot::Value(value);
            }
        }
        Ok(())
    }

    /// Read one non-container value.
    fn read_single(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        kind: &FieldKind,
        wire_type: WireType,
        r: &mut WireReader<'_>,
        depth: usize,
    ) -> Result<DynamicValue, MarshalError> {
        match kind {
            FieldKind::Scalar(k) => {
                self.expect_wire(schema, field, wire_type, k.wire_type())?;
                let scalar = r.read_scalar(*k).map_err(|e| self.wire(schema, e))?;
                Ok(coerce::to_value(scalar))
            }
            FieldKind::Enum(name) => {
                self.expect_wire(schema, field, wire_type, WireType::Varint)?;
                // Enums are int32 on the wire; wider varints truncate.
                let n = r.read_varint().map_err(|e| self.wire(schema, e))? as i32;
                Ok(enum_value(self.pool, self.config, name, n))
            }
            FieldKind::Message(name) => {
                self.expect_wire(schema, field, wire_type, WireType::LengthDelimited)?;
                let bytes = r.read_len_delimited().map_err(|e| self.wire(schema, e))?;
                let nested = lookup_schema(self.pool, name, self.op)?;
                self.message(nested, bytes, depth + 1)
            }
            FieldKind::Repeated(_) | FieldKind::Map(..) => Err(self.malformed(
                schema,
                format!("field '{}' nests a container inside a container", field.name),
            )),
        }
    }

    fn map_entry(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        key_kind: ScalarKind,
        value_kind: &FieldKind,
        entry: &[u8],
        depth: usize,
    ) -> Result<(MapKey, DynamicValue), MarshalError> {
        let mut r = WireReader::new(entry);
        let mut key = None;
        let mut value = None;
        while !r.is_at_end() {
            let (number, wire_type) = r.read_key().map_err(|e| self.wire(schema, e))?;
            match number {
                1 => {
                    self.expect_wire(schema, field, wire_type, key_kind.wire_type())?;
                    let scalar = r.read_scalar(key_kind).map_err(|e| self.wire(schema, e))?;
                    key = Some(coerce::to_map_key(scalar).ok_or_else(|| {
                        self.malformed(schema, format!("map field '{}' has a non-key key type", field.name))
                    })?);
                }
                2 => value = Some(self.read_single(schema, field, value_kind, wire_type, &mut r, depth)?),
                _ => r.skip_field(number, wire_type).map_err(|e| self.wire(schema, e))?,
            }
        }
        let key = match key {
            Some(key) => key,
            None => zero_key(key_kind),
        };
        let value = match value {
            Some(value) => value,
            None => self.default_single(value_kind, depth)?,
        };
        Ok((key, value))
    }

    fn finish(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        slot: Slot<'_>,
        depth: usize,
    ) -> Result<DynamicValue, MarshalError> {
        match (slot, &field.kind) {
            (Slot::Value(value), _) => Ok(value),
            (Slot::Chunks(chunks), FieldKind::Message(name)) => {
                let nested = lookup_schema(self.pool, name, self.op)?;
                match chunks.as_slice() {
                    [single] => self.message(nested, single, depth + 1),
                    many => self.message(nested, &many.concat(), depth + 1),
                }
            }
            (Slot::Chunks(_), _) => Err(self.malformed(schema, format!("field '{}' is not a message", field.name))),
            (Slot::Absent, _) => {
                let mut stack = self.path.borrow().clone();
                default_field(self.pool, self.config, field, &mut stack, self.op)
            }
        }
    }

    /// Value of a map entry whose value record is missing.
    fn default_single(&self, kind: &FieldKind, depth: usize) -> Result<DynamicValue, MarshalError> {
        match kind {
            FieldKind::Scalar(k) => Ok(DynamicValue::zero(*k)),
            FieldKind::Enum(name) => {
                let first = self.pool.enum_type(name).map_or(0, |e| e.first_number());
                Ok(enum_value(self.pool, self.config, name, first))
            }
            FieldKind::Message(name) => {
                let nested = lookup_schema(self.pool, name, self.op)?;
                self.message(nested, &[], depth + 1)
            }
            FieldKind::Repeated(_) | FieldKind::Map(..) => Ok(DynamicValue::Nil),
        }
    }

    fn expect_wire(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        found: WireType,
        expected: WireType,
    ) -> Result<(), MarshalError> {
        if found == expected {
            Ok(())
        } else {
            Err(self.malformed(
                schema,
                format!(
                    "field '{}' (number {}) has wire type {}, expected {}",
                    field.name,
                    field.number,
                    wire_type_id(found),
                    wire_type_id(expected)
                ),
            ))
        }
    }

    fn malformed(&self, schema: &SchemaDescriptor, reason: String) -> MarshalError {
        MarshalError::MalformedInput { schema: schema.qualified_name().to_string(), reason, op: self.op }
    }

    fn wire(&self, schema: &SchemaDescriptor, error: WireError) -> MarshalError {
        self.malformed(schema, error.to_string())
    }
}

/// Wire type of one element inside a packed run, for packable kinds.
fn packed_wire_type(kind: &FieldKind) -> Option<WireType> {
    match kind {
        FieldKind::Scalar(k) if k.is_packable() => Some(k.wire_type()),
        FieldKind::Enum(_) => Some(WireType::Varint),
        _ => None,
    }
}

fn zero_key(kind: ScalarKind) -> MapKey {
    match DynamicValue::zero(kind) {
        DynamicValue::Bool(b) => MapKey::Bool(b),
        DynamicValue::Str(s) => MapKey::Str(s),
        DynamicValue::Int(n) => MapKey::Int(n),
        _ => MapKey::Int(0),
    }
}
