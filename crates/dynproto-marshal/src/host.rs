//! # Host Call Surface
//!
//! [`ProtoHost`] is what a scripting binding wraps: nine calls whose
//! result shapes are a success flag or an optional value. Failures are
//! logged and swallowed so a bad schema name or a corrupt buffer never
//! takes the host down. The `try_*` variants return the typed error
//! instead, for Rust callers that want to branch on it.
//!
//! Each marshaling call takes one registry snapshot up front, so a
//! `reload` running on another thread never changes the pool halfway
//! through a call.

use std::sync::Arc;

use dynproto_core::{DynamicValue, MarshalError, ParseError};
use dynproto_schema::{DescriptorPool, SchemaRegistry};
use tracing::warn;

use crate::config::MarshalConfig;
use crate::marshaler::Marshaler;

/// Registry plus marshaling configuration, shared by every call.
#[derive(Debug, Default)]
pub struct ProtoHost {
    registry: SchemaRegistry,
    config: MarshalConfig,
}

impl ProtoHost {
    /// A host over an empty disk-backed registry.
    pub fn new(config: MarshalConfig) -> Self {
        Self::with_registry(SchemaRegistry::new(), config)
    }

    pub fn with_registry(registry: SchemaRegistry, config: MarshalConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(Marshaler<'_>) -> T) -> T {
        let pool: Arc<DescriptorPool> = self.registry.snapshot();
        f(Marshaler::new(&pool, &self.config))
    }

    // -- Result-returning calls --

    pub fn try_parse(&self, path: &str) -> Result<(), ParseError> {
        self.registry.parse(path)
    }

    pub fn try_create(&self, name: &str) -> Result<DynamicValue, MarshalError> {
        self.with_snapshot(|m| m.create(name))
    }

    pub fn try_encode(&self, name: &str, value: &DynamicValue) -> Result<Vec<u8>, MarshalError> {
        self.with_snapshot(|m| m.encode(name, value))
    }

    pub fn try_decode(&self, name: &str, bytes: &[u8]) -> Result<DynamicValue, MarshalError> {
        self.with_snapshot(|m| m.decode(name, bytes))
    }

    pub fn try_pack(&self, name: &str, values: &[DynamicValue]) -> Result<Vec<u8>, MarshalError> {
        self.with_snapshot(|m| m.pack(name, values))
    }

    pub fn try_unpack(&self, name: &str, bytes: &[u8]) -> Result<Vec<DynamicValue>, MarshalError> {
        self.with_snapshot(|m| m.unpack(name, bytes))
    }

    pub fn try_reload(&self) -> Result<(), ParseError> {
        self.registry.reload()
    }

    // -- Host calls --

    /// Load a schema file and its imports.
    pub fn parse(&self, path: &str) -> bool {
        match self.try_parse(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(file = path, error = %e, "proto.parse fail");
                false
            }
        }
    }

    /// Whether a message schema of this name is loaded.
    pub fn exist(&self, name: &str) -> bool {
        self.registry.exists(name)
    }

    /// A fresh message with every field at its default.
    pub fn create(&self, name: &str) -> Option<DynamicValue> {
        logged(self.try_create(name), "proto.create fail", name)
    }

    pub fn encode(&self, name: &str, value: &DynamicValue) -> Option<Vec<u8>> {
        logged(self.try_encode(name, value), "proto.encode fail", name)
    }

    pub fn decode(&self, name: &str, bytes: &[u8]) -> Option<DynamicValue> {
        logged(self.try_decode(name, bytes), "proto.decode fail", name)
    }

    pub fn pack(&self, name: &str, values: &[DynamicValue]) -> Option<Vec<u8>> {
        logged(self.try_pack(name, values), "proto.pack fail", name)
    }

    pub fn unpack(&self, name: &str, bytes: &[u8]) -> Option<Vec<DynamicValue>> {
        logged(self.try_unpack(name, bytes), "proto.unpack fail", name)
    }

    /// Rebuild the pool from every parsed file. On failure the previous
    /// pool stays in service.
    pub fn reload(&self) -> bool {
        match self.try_reload() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "proto.reload fail");
                false
            }
        }
    }

    pub fn map_path(&self, virtual_prefix: &str, real_dir: &str) {
        self.registry.map_path(virtual_prefix, real_dir);
    }
}

fn logged<T>(result: Result<T, MarshalError>, event: &'static str, schema: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(schema, kind = %e.kind(), error = %e, "{}", event);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use dynproto_core::{message, ErrorKind};
    use dynproto_schema::MemorySourceTree;

    use super::*;

    fn host(tree: &MemorySourceTree) -> ProtoHost {
        let registry = SchemaRegistry::with_source_tree(Arc::new(tree.clone()));
        ProtoHost::with_registry(registry, MarshalConfig::default())
    }

    fn person_tree() -> MemorySourceTree {
        let tree = MemorySourceTree::new();
        tree.insert(
            "person.proto",
            "syntax = \"proto3\"; package demo; message Person { string name = 1; int32 id = 2; string email = 3; }",
        );
        tree
    }

    #[test]
    fn test_host_calls_succeed() {
        let tree = person_tree();
        let host = host(&tree);
        assert!(host.parse("person.proto"));
        assert!(host.exist("demo.Person"));
        assert!(!host.exist("demo.Ghost"));

        let created = host.create("demo.Person").unwrap();
        assert_eq!(created, message! { "name" => "", "id" => 0, "email" => "" });

        let value = message! { "name" => "Alice", "id" => 7, "email" => "a@x.com" };
        let bytes = host.encode("demo.Person", &value).unwrap();
        assert_eq!(host.decode("demo.Person", &bytes), Some(value));

        let packed = host.pack("demo.Person", &["Alice".into(), 7.into(), "a@x.com".into()]).unwrap();
        assert_eq!(packed, bytes);
        assert_eq!(host.unpack("demo.Person", &packed).map(|v| v.len()), Some(3));
    }

    #[test]
    fn test_host_failures_are_not_fatal() {
        let tree = person_tree();
        let host = host(&tree);
        assert!(!host.parse("missing.proto"));
        assert!(host.create("demo.Person").is_none());
        assert!(host.parse("person.proto"));
        assert!(host.encode("demo.Person", &message! { "id" => "seven" }).is_none());
        assert!(host.decode("demo.Person", &[0x0a, 0x09]).is_none());
        assert!(host.pack("demo.Person", &vec![DynamicValue::Nil; 4]).is_none());
        assert!(host.unpack("demo.Ghost", &[]).is_none());
        // Still serving after every failure above.
        assert!(host.encode("demo.Person", &message! { "id" => 1 }).is_some());
    }

    #[test]
    fn test_try_variants_expose_kind() {
        let tree = person_tree();
        let host = host(&tree);
        host.parse("person.proto");
        assert_eq!(host.try_create("Person").unwrap_err().kind(), ErrorKind::UnknownSchema);
        assert_eq!(
            host.try_encode("demo.Person", &message! { "id" => "x" }).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(host.try_decode("demo.Person", &[0x08]).unwrap_err().kind(), ErrorKind::MalformedInput);
        assert_eq!(host.try_pack("demo.Person", &vec![DynamicValue::Nil; 5]).unwrap_err().kind(), ErrorKind::ArityMismatch);
        assert!(matches!(host.try_parse("nope.proto"), Err(ParseError::NotFound { .. })));
    }

    #[test]
    fn test_failed_reload_keeps_pool() {
        let tree = person_tree();
        let host = host(&tree);
        assert!(host.parse("person.proto"));
        tree.insert("person.proto", "syntax = \"proto3\"; message Person { string name = 1");
        assert!(!host.reload());
        assert!(host.exist("demo.Person"));

        tree.insert("person.proto", "syntax = \"proto3\"; package demo; message Person { string name = 1; }");
        assert!(host.reload());
        assert_eq!(host.create("demo.Person"), Some(message! { "name" => "" }));
    }

    #[test]
    fn test_map_path_applies_to_later_parse() {
        let tree = MemorySourceTree::new();
        tree.insert("/srv/proto/a.proto", "syntax = \"proto3\"; message A { int32 x = 1; }");
        let host = host(&tree);
        assert!(!host.parse("proto/a.proto"));
        host.map_path("proto", "/srv/proto");
        assert!(host.parse("proto/a.proto"));
        assert!(host.exist("A"));
    }
}
