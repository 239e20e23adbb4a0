//! # Schema Descriptors
//!
//! Immutable, linked descriptions of messages and enums as published by a
//! descriptor pool. Descriptors are built once by the schema linker and
//! never mutated afterwards: all state is private and exposed through
//! accessors. A reload builds new descriptors and swaps the whole pool.
//!
//! ## Invariants
//!
//! - Field names and field numbers are unique within a message.
//! - `declaration_index` equals the field's position in
//!   [`SchemaDescriptor::fields`] and is the order positional marshaling
//!   uses.
//! - Nested message and enum references are qualified names without a
//!   leading dot.

use std::collections::HashMap;

use crate::kind::FieldKind;
use crate::value::DynamicValue;

/// Source syntax level of the declaring file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

/// How presence of a singular field is tracked on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    /// proto3 singular scalar: a zero value is indistinguishable from absent
    /// and is not written.
    Implicit,
    /// Written whenever the value is present (proto2 `optional`, proto3
    /// `optional`, oneof members, message fields).
    Explicit,
    /// proto2 `required`: written even when absent, using the default.
    Required,
}

/// One declared field of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Wire tag.
    pub number: u32,
    /// Position in the declaring message, starting at zero.
    pub declaration_index: usize,
    pub kind: FieldKind,
    pub presence: Presence,
    /// Repeated scalars are written as one length-delimited run.
    pub packed: bool,
    /// Kind-appropriate default. `Nil` for message fields, whose defaults
    /// are constructed on demand; an empty `List` or `Map` for containers.
    pub default_value: DynamicValue,
    /// Enclosing oneof, if any.
    pub oneof: Option<String>,
}

impl FieldDescriptor {
    /// Whether the field's value must be written even when it equals the
    /// zero default.
    pub fn has_explicit_presence(&self) -> bool {
        !matches!(self.presence, Presence::Implicit)
    }
}

/// A linked message type.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    qualified_name: String,
    file: String,
    syntax: Syntax,
    fields: Vec<FieldDescriptor>,
    nested: Vec<String>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl SchemaDescriptor {
    /// Build a descriptor from its fields in declaration order.
    ///
    /// Each field's `declaration_index` is overwritten with its position.
    /// The caller (the schema linker) has already rejected duplicate names
    /// and numbers; on duplicates the first declaration wins the lookup.
    pub fn new(
        qualified_name: impl Into<String>,
        file: impl Into<String>,
        syntax: Syntax,
        mut fields: Vec<FieldDescriptor>,
        nested: Vec<String>,
    ) -> Self {
        let mut by_number = HashMap::with_capacity(fields.len());
        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter_mut().enumerate() {
            field.declaration_index = index;
            by_number.entry(field.number).or_insert(index);
            by_name.entry(field.name.clone()).or_insert(index);
        }
        Self {
            qualified_name: qualified_name.into(),
            file: file.into(),
            syntax,
            fields,
            nested,
            by_number,
            by_name,
        }
    }

    /// Fully qualified name, e.g. `tutorial.Person.PhoneNumber`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Last segment of the qualified name.
    pub fn short_name(&self) -> &str {
        self.qualified_name.rsplit('.').next().unwrap_or(&self.qualified_name)
    }

    /// Virtual name of the file that declared this message.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field at a declaration index.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Qualified names of the messages and enums declared inside this one.
    pub fn nested(&self) -> &[String] {
        &self.nested
    }
}

/// A linked enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    qualified_name: String,
    file: String,
    values: Vec<(String, i32)>,
}

impl EnumDescriptor {
    /// Build a descriptor from `(name, number)` pairs in declaration order.
    pub fn new(
        qualified_name: impl Into<String>,
        file: impl Into<String>,
        values: Vec<(String, i32)>,
    ) -> Self {
        Self { qualified_name: qualified_name.into(), file: file.into(), values }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Values in declaration order.
    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    /// Number of the named value.
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Name of the first value declared with `number` (aliases share a
    /// number).
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values.iter().find(|(_, v)| *v == number).map(|(n, _)| n.as_str())
    }

    /// The first declared value, which is the default of an enum field
    /// without an explicit `default` option.
    pub fn first_number(&self) -> i32 {
        self.values.first().map_or(0, |(_, v)| *v)
    }
}
