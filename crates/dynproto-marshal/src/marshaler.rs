//! The marshaling entry point bound to one pool snapshot.

use std::sync::Arc;

use dynproto_core::{DynamicValue, MarshalError, SchemaDescriptor};
use dynproto_schema::DescriptorPool;

use crate::config::MarshalConfig;

/// Runs factory and marshaling operations against a single pool.
///
/// Every descriptor a call touches, nested schemas included, comes from
/// the pool given here, so a call never observes two different pools.
#[derive(Debug, Clone, Copy)]
pub struct Marshaler<'p> {
    pub(crate) pool: &'p DescriptorPool,
    pub(crate) config: &'p MarshalConfig,
}

impl<'p> Marshaler<'p> {
    pub fn new(pool: &'p DescriptorPool, config: &'p MarshalConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &'p DescriptorPool {
        self.pool
    }

    pub fn config(&self) -> &'p MarshalConfig {
        self.config
    }

    pub(crate) fn schema(&self, name: &str, op: &'static str) -> Result<&'p SchemaDescriptor, MarshalError> {
        lookup_schema(self.pool, name, op)
    }
}

pub(crate) fn lookup_schema<'p>(
    pool: &'p DescriptorPool,
    name: &str,
    op: &'static str,
) -> Result<&'p SchemaDescriptor, MarshalError> {
    pool.message(name)
        .map(Arc::as_ref)
        .ok_or_else(|| MarshalError::UnknownSchema { name: name.to_string(), op })
}

/// Host value of an enum number: the value name when configured and
/// declared, otherwise the number.
pub(crate) fn enum_value(pool: &DescriptorPool, config: &MarshalConfig, enum_name: &str, number: i32) -> DynamicValue {
    if config.enums_as_names {
        if let Some(name) = pool.enum_type(enum_name).and_then(|e| e.name_of(number)) {
            return DynamicValue::Str(name.to_string());
        }
    }
    DynamicValue::Int(i64::from(number))
}
