//! # Named Marshaling
//!
//! `encode` reads field values out of a message value by field name;
//! `decode` produces a message value keyed by field name, listing every
//! declared field in declaration order. Keys of the input that name no
//! declared field are ignored.

use dynproto_core::{DynamicValue, MarshalError};
use tracing::debug;

use crate::coerce;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::marshaler::Marshaler;

impl<'p> Marshaler<'p> {
    /// Encode a message value against schema `name`.
    pub fn encode(&self, name: &str, value: &DynamicValue) -> Result<Vec<u8>, MarshalError> {
        let schema = self.schema(name, "encode")?;
        let fields = match value {
            DynamicValue::Message(fields) => fields,
            DynamicValue::List(items) if items.is_empty() => return Ok(Vec::new()),
            other => {
                return Err(MarshalError::TypeMismatch {
                    schema: schema.qualified_name().to_string(),
                    field: "(value)".to_string(),
                    expected: format!("message {}", schema.qualified_name()),
                    found: coerce::describe(other),
                    op: "encode",
                })
            }
        };
        for key in fields.keys().filter(|k| schema.field_by_name(k).is_none()) {
            debug!(schema = schema.qualified_name(), key = %key, "ignoring undeclared key");
        }
        Encoder::new(self.pool, "encode").message(schema, |f| fields.get(f.name.as_str()))
    }

    /// Decode `bytes` as schema `name` into a message value.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Result<DynamicValue, MarshalError> {
        let schema = self.schema(name, "decode")?;
        Decoder::new(self.pool, self.config, "decode").message(schema, bytes, 0)
    }
}
