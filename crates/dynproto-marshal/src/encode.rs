//! # Encoder — Host Values to Wire Bytes
//!
//! Shared by named `encode` and positional `pack`; the two differ only in
//! how a field's value is looked up. Fields are written in field-number
//! order, which is the canonical protobuf serialization order.
//!
//! ## Presence
//!
//! - An absent field (missing or `Nil`) is not written, except a
//!   `required` field, which is written with its default.
//! - A present implicit-presence field equal to its zero value is not
//!   written.
//! - Everything else that is present is written, zero or not.
//! - At most one member of a oneof may be present.

use dynproto_core::wire::{put_scalar, ScalarValue};
use dynproto_core::{
    DynamicValue, FieldDescriptor, FieldKind, MarshalError, Presence, ScalarKind, SchemaDescriptor, WireType,
    WireWriter,
};
use dynproto_schema::DescriptorPool;

use crate::coerce;
use crate::marshaler::lookup_schema;

pub(crate) struct Encoder<'a> {
    pool: &'a DescriptorPool,
    op: &'static str,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(pool: &'a DescriptorPool, op: &'static str) -> Self {
        Self { pool, op }
    }

    /// Encode one message body, taking each field's value from `lookup`.
    pub(crate) fn message<'v>(
        &self,
        schema: &SchemaDescriptor,
        lookup: impl Fn(&FieldDescriptor) -> Option<&'v DynamicValue>,
    ) -> Result<Vec<u8>, MarshalError> {
        let mut fields: Vec<&FieldDescriptor> = schema.fields().iter().collect();
        fields.sort_by_key(|f| f.number);

        let mut w = WireWriter::new();
        let mut chosen: Vec<(&str, &str)> = Vec::new();
        for field in fields {
            match lookup(field).filter(|v| !v.is_nil()) {
                Some(value) => {
                    if let Some(oneof) = field.oneof.as_deref() {
                        self.choose(schema, field, oneof, &mut chosen)?;
                    }
                    self.field(schema, field, value, &mut w)?
                }
                None if field.presence == Presence::Required => self.required_default(schema, field, &mut w)?,
                None => {}
            }
        }
        Ok(w.into_vec())
    }

    fn field(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        value: &DynamicValue,
        w: &mut WireWriter,
    ) -> Result<(), MarshalError> {
        match &field.kind {
            FieldKind::Repeated(inner) => {
                let items: &[DynamicValue] = match value {
                    DynamicValue::List(items) => items,
                    // An empty host table has no shape of its own.
                    DynamicValue::Message(m) if m.is_empty() => &[],
                    _ => return Err(self.mismatch(schema, field, &field.kind, value)),
                };
                if field.packed {
                    let mut payload = WireWriter::new();
                    for item in items {
                        self.packed_element(schema, field, inner, item, &mut payload)?;
                    }
                    if !payload.is_empty() {
                        w.put_key(field.number, WireType::LengthDelimited);
                        w.put_len_delimited(payload.as_slice());
                    }
                } else {
                    for item in items {
                        self.single(schema, field, inner, item, field.number, false, w)?;
                    }
                }
                Ok(())
            }
            FieldKind::Map(key_kind, value_kind) => match value {
                DynamicValue::Map(entries) => {
                    for (key, item) in entries.iter().filter(|(_, v)| !v.is_nil()) {
                        let key_value = DynamicValue::from(key.clone());
                        let key = coerce::map_key(*key_kind, key)
                            .ok_or_else(|| self.mismatch(schema, field, &FieldKind::Scalar(*key_kind), &key_value))?;
                        self.map_entry(schema, field, *key_kind, key, value_kind, item, w)?;
                    }
                    Ok(())
                }
                DynamicValue::Message(entries) => {
                    for (name, item) in entries.iter().filter(|(_, v)| !v.is_nil()) {
                        let key = coerce::map_key_from_name(*key_kind, name).ok_or_else(|| {
                            self.mismatch(schema, field, &FieldKind::Scalar(*key_kind), &DynamicValue::from(name.as_str()))
                        })?;
                        self.map_entry(schema, field, *key_kind, key, value_kind, item, w)?;
                    }
                    Ok(())
                }
                _ => Err(self.mismatch(schema, field, &field.kind, value)),
            },
            kind => {
                let skip_zero = field.presence == Presence::Implicit;
                self.single(schema, field, kind, value, field.number, skip_zero, w)
            }
        }
    }

    /// Write one non-container value under `number`.
    #[allow(clippy::too_many_arguments)]
    fn single(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        kind: &FieldKind,
        value: &DynamicValue,
        number: u32,
        skip_zero: bool,
        w: &mut WireWriter,
    ) -> Result<(), MarshalError> {
        match kind {
            FieldKind::Scalar(k) => {
                let scalar = coerce::scalar(*k, value).ok_or_else(|| self.mismatch(schema, field, kind, value))?;
                if skip_zero && coerce::is_zero(&scalar) {
                    return Ok(());
                }
                w.put_key(number, k.wire_type());
                put_scalar(w, *k, &scalar);
            }
            FieldKind::Enum(name) => {
                let n = self.enum_number(schema, field, kind, name, value)?;
                if skip_zero && n == 0 {
                    return Ok(());
                }
                w.put_key(number, WireType::Varint);
                put_scalar(w, ScalarKind::Int32, &ScalarValue::I32(n));
            }
            FieldKind::Message(name) => {
                let DynamicValue::Message(fields) = value else {
                    return Err(self.mismatch(schema, field, kind, value));
                };
                let nested = lookup_schema(self.pool, name, self.op)?;
                let body = self.message(nested, |f| fields.get(f.name.as_str()))?;
                w.put_key(number, WireType::LengthDelimited);
                w.put_len_delimited(&body);
            }
            FieldKind::Repeated(_) | FieldKind::Map(..) => return Err(self.mismatch(schema, field, kind, value)),
        }
        Ok(())
    }

    fn packed_element(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        kind: &FieldKind,
        value: &DynamicValue,
        payload: &mut WireWriter,
    ) -> Result<(), MarshalError> {
        match kind {
            FieldKind::Scalar(k) => {
                let scalar = coerce::scalar(*k, value).ok_or_else(|| self.mismatch(schema, field, kind, value))?;
                put_scalar(payload, *k, &scalar);
            }
            FieldKind::Enum(name) => {
                let n = self.enum_number(schema, field, kind, name, value)?;
                put_scalar(payload, ScalarKind::Int32, &ScalarValue::I32(n));
            }
            _ => return Err(self.mismatch(schema, field, kind, value)),
        }
        Ok(())
    }

    /// One map entry: key as field 1, value as field 2, both always written.
    #[allow(clippy::too_many_arguments)]
    fn map_entry(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        key_kind: ScalarKind,
        key: ScalarValue,
        value_kind: &FieldKind,
        value: &DynamicValue,
        w: &mut WireWriter,
    ) -> Result<(), MarshalError> {
        let mut entry = WireWriter::new();
        entry.put_key(1, key_kind.wire_type());
        put_scalar(&mut entry, key_kind, &key);
        self.single(schema, field, value_kind, value, 2, false, &mut entry)?;
        w.put_key(field.number, WireType::LengthDelimited);
        w.put_len_delimited(entry.as_slice());
        Ok(())
    }

    fn required_default(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        w: &mut WireWriter,
    ) -> Result<(), MarshalError> {
        match &field.kind {
            FieldKind::Message(_) => {
                w.put_key(field.number, WireType::LengthDelimited);
                w.put_len_delimited(&[]);
                Ok(())
            }
            kind => self.single(schema, field, kind, &field.default_value, field.number, false, w),
        }
    }

    fn enum_number(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        kind: &FieldKind,
        enum_name: &str,
        value: &DynamicValue,
    ) -> Result<i32, MarshalError> {
        let descriptor = self
            .pool
            .enum_type(enum_name)
            .ok_or_else(|| MarshalError::UnknownSchema { name: enum_name.to_string(), op: self.op })?;
        coerce::enum_number(descriptor, value).ok_or_else(|| self.mismatch(schema, field, kind, value))
    }

    /// Record `field` as the member set for `oneof`, failing if another
    /// member already is.
    fn choose<'f>(
        &self,
        schema: &SchemaDescriptor,
        field: &'f FieldDescriptor,
        oneof: &'f str,
        chosen: &mut Vec<(&'f str, &'f str)>,
    ) -> Result<(), MarshalError> {
        if let Some((_, other)) = chosen.iter().find(|(name, _)| *name == oneof) {
            return Err(MarshalError::TypeMismatch {
                schema: schema.qualified_name().to_string(),
                field: field.name.clone(),
                expected: format!("at most one member of oneof {oneof}"),
                found: format!("'{other}' also set"),
                op: self.op,
            });
        }
        chosen.push((oneof, field.name.as_str()));
        Ok(())
    }

    fn mismatch(
        &self,
        schema: &SchemaDescriptor,
        field: &FieldDescriptor,
        expected: &FieldKind,
        value: &DynamicValue,
    ) -> MarshalError {
        MarshalError::TypeMismatch {
            schema: schema.qualified_name().to_string(),
            field: field.name.clone(),
            expected: expected.to_string(),
            found: coerce::describe(value),
            op: self.op,
        }
    }
}
