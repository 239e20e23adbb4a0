//! # Message Factory
//!
//! `create` builds a message value holding every declared field at its
//! default: zero or the declared `[default]` for scalars and enums, empty
//! lists and maps for containers, and a recursively default-constructed
//! value for embedded messages.
//!
//! Oneof members are left `Nil`: no member is set.
//!
//! A message type that is already being constructed further up the same
//! path is not expanded again; that field is left `Nil`. This keeps
//! self-referential schemas (trees, linked lists) finite.

use dynproto_core::{DynamicValue, FieldDescriptor, FieldKind, MarshalError, SchemaDescriptor};
use dynproto_schema::DescriptorPool;
use indexmap::IndexMap;

use crate::config::MarshalConfig;
use crate::marshaler::{enum_value, lookup_schema, Marshaler};

impl<'p> Marshaler<'p> {
    /// A default-initialized message of schema `name`.
    pub fn create(&self, name: &str) -> Result<DynamicValue, MarshalError> {
        let schema = self.schema(name, "create")?;
        let mut stack = vec![schema.qualified_name().to_string()];
        default_message(self.pool, self.config, schema, &mut stack, "create")
    }
}

/// Every field of `schema` at its default. `stack` holds the qualified
/// names of the messages under construction, `schema` included.
pub(crate) fn default_message(
    pool: &DescriptorPool,
    config: &MarshalConfig,
    schema: &SchemaDescriptor,
    stack: &mut Vec<String>,
    op: &'static str,
) -> Result<DynamicValue, MarshalError> {
    let mut fields = IndexMap::with_capacity(schema.field_count());
    for field in schema.fields() {
        fields.insert(field.name.clone(), default_field(pool, config, field, stack, op)?);
    }
    Ok(DynamicValue::Message(fields))
}

/// Default of one field. Oneof members start unset, and a message type
/// already on `stack` yields `Nil`.
pub(crate) fn default_field(
    pool: &DescriptorPool,
    config: &MarshalConfig,
    field: &FieldDescriptor,
    stack: &mut Vec<String>,
    op: &'static str,
) -> Result<DynamicValue, MarshalError> {
    if field.oneof.is_some() {
        return Ok(DynamicValue::Nil);
    }
    match &field.kind {
        FieldKind::Message(name) if stack.iter().any(|s| s == name) => Ok(DynamicValue::Nil),
        FieldKind::Message(name) => {
            let nested = lookup_schema(pool, name, op)?;
            stack.push(name.clone());
            let value = default_message(pool, config, nested, stack, op);
            stack.pop();
            value
        }
        FieldKind::Enum(name) => Ok(match field.default_value.as_i64() {
            Some(n) => enum_value(pool, config, name, n as i32),
            None => field.default_value.clone(),
        }),
        _ => Ok(field.default_value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynproto_core::message;
    use dynproto_schema::{MemorySourceTree, SchemaRegistry};

    use super::*;
    use crate::config::MarshalConfig;

    fn registry(text: &str) -> SchemaRegistry {
        let tree = MemorySourceTree::new();
        tree.insert("t.proto", text);
        let registry = SchemaRegistry::with_source_tree(Arc::new(tree));
        registry.parse("t.proto").unwrap();
        registry
    }

    #[test]
    fn test_create_person() {
        let registry = registry(
            "syntax = \"proto3\"; message Person { string name = 1; int32 id = 2; string email = 3; }",
        );
        let pool = registry.snapshot();
        let config = MarshalConfig::default();
        let person = Marshaler::new(&pool, &config).create("Person").unwrap();
        assert_eq!(person, message! { "name" => "", "id" => 0, "email" => "" });
    }

    #[test]
    fn test_create_nested_containers_and_defaults() {
        let registry = registry(
            r#"
            package shop;
            enum State { OPEN = 1; CLOSED = 2; }
            message Money { optional int64 units = 1 [default = 5]; }
            message Order {
              optional Money total = 1;
              repeated string tags = 2;
              map<string, Money> parts = 3;
              optional State state = 4;
              optional double ratio = 5 [default = 0.5];
            }
            "#,
        );
        let pool = registry.snapshot();
        let config = MarshalConfig::default();
        let order = Marshaler::new(&pool, &config).create("shop.Order").unwrap();
        assert_eq!(order.get("total"), Some(&message! { "units" => 5 }));
        assert_eq!(order.get("tags"), Some(&DynamicValue::List(vec![])));
        assert_eq!(order.get("parts"), Some(&DynamicValue::Map(Default::default())));
        assert_eq!(order.get("state"), Some(&DynamicValue::Int(1)));
        assert_eq!(order.get("ratio"), Some(&DynamicValue::Float(0.5)));

        let named = MarshalConfig { enums_as_names: true, ..MarshalConfig::default() };
        let order = Marshaler::new(&pool, &named).create("shop.Order").unwrap();
        assert_eq!(order.get("state"), Some(&DynamicValue::from("OPEN")));
    }

    #[test]
    fn test_create_recursive_schema_stops_at_cycle() {
        let registry = registry(
            "syntax = \"proto3\"; message Node { int32 value = 1; Node next = 2; Leaf leaf = 3; }
             message Leaf { Node back = 1; string tag = 2; }",
        );
        let pool = registry.snapshot();
        let config = MarshalConfig::default();
        let node = Marshaler::new(&pool, &config).create("Node").unwrap();
        let DynamicValue::Message(fields) = &node else { panic!("not a message") };
        assert_eq!(fields.get("next"), Some(&DynamicValue::Nil));
        let leaf = node.get("leaf").unwrap();
        assert_eq!(leaf.get("tag"), Some(&DynamicValue::from("")));
        let DynamicValue::Message(leaf_fields) = leaf else { panic!("not a message") };
        assert_eq!(leaf_fields.get("back"), Some(&DynamicValue::Nil));
    }

    #[test]
    fn test_create_leaves_oneof_unset() {
        let registry = registry(
            "syntax = \"proto3\"; message Shape { string label = 1; oneof size { double radius = 2; int32 side = 3; } }",
        );
        let pool = registry.snapshot();
        let config = MarshalConfig::default();
        let shape = Marshaler::new(&pool, &config).create("Shape").unwrap();
        let DynamicValue::Message(fields) = &shape else { panic!("not a message") };
        assert_eq!(fields.get("label"), Some(&DynamicValue::from("")));
        assert_eq!(fields.get("radius"), Some(&DynamicValue::Nil));
        assert_eq!(fields.get("side"), Some(&DynamicValue::Nil));
    }

    #[test]
    fn test_create_unknown_schema() {
        let registry = registry("syntax = \"proto3\"; message A {}");
        let pool = registry.snapshot();
        let config = MarshalConfig::default();
        let err = Marshaler::new(&pool, &config).create("B").unwrap_err();
        assert_eq!(err, MarshalError::UnknownSchema { name: "B".into(), op: "create" });
    }
}
