//! # Positional Marshaling
//!
//! `pack` takes field values as an ordered argument list and `unpack`
//! returns one: element `i` belongs to the field declared `i`-th in the
//! schema, whatever its field number. A `Nil` argument, like a missing
//! trailing one, leaves its field absent.

use dynproto_core::{DynamicValue, MarshalError};

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::marshaler::Marshaler;

impl<'p> Marshaler<'p> {
    /// Encode `values` positionally against schema `name`.
    pub fn pack(&self, name: &str, values: &[DynamicValue]) -> Result<Vec<u8>, MarshalError> {
        let schema = self.schema(name, "pack")?;
        if values.len() > schema.field_count() {
            return Err(MarshalError::ArityMismatch {
                schema: schema.qualified_name().to_string(),
                declared: schema.field_count(),
                given: values.len(),
                op: "pack",
            });
        }
        Encoder::new(self.pool, "pack").message(schema, |f| values.get(f.declaration_index))
    }

    /// Decode `bytes` as schema `name` into declaration-ordered values.
    pub fn unpack(&self, name: &str, bytes: &[u8]) -> Result<Vec<DynamicValue>, MarshalError> {
        let schema = self.schema(name, "unpack")?;
        Decoder::new(self.pool, self.config, "unpack").fields(schema, bytes, 0)
    }
}
