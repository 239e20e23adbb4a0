//! Integration test: a registry reading a real directory tree.
//!
//! Schema files are written into a temporary directory, reached through a
//! virtual prefix, edited on disk, and reloaded.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use dynproto_core::{FieldKind, ParseError};
use dynproto_schema::SchemaRegistry;

const COMMON: &str = r#"
syntax = "proto3";
package acme.common;

message Money {
  string currency = 1;
  int64 units = 2;
}
"#;

const ORDER: &str = r#"
syntax = "proto3";
package acme.shop;

import "proto/common.proto";

message Order {
  string id = 1;
  acme.common.Money total = 2;
  repeated Line lines = 3;

  message Line {
    string sku = 1;
    uint32 quantity = 2;
  }
}
"#;

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

fn registry_for(dir: &Path) -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry.map_path("proto/", dir.to_str().unwrap());
    registry
}

#[test]
fn test_parse_through_virtual_prefix() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "common.proto", COMMON);
    write(dir.path(), "order.proto", ORDER);

    let registry = registry_for(dir.path());
    registry.parse("proto/order.proto").unwrap();

    let pool = registry.snapshot();
    assert_eq!(pool.message_names(), ["acme.common.Money", "acme.shop.Order", "acme.shop.Order.Line"]);
    let order = pool.message("acme.shop.Order").unwrap();
    assert_eq!(order.field_by_name("total").unwrap().kind, FieldKind::Message("acme.common.Money".into()));

    let files: Vec<&str> = pool.files().map(|f| f.name.as_str()).collect();
    assert_eq!(files, ["proto/common.proto", "proto/order.proto"]);
    let common = pool.file("proto/common.proto").unwrap();
    assert_eq!(Path::new(&common.real_path), dir.path().join("common.proto"));
}

#[test]
fn test_missing_file_lists_probed_paths() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry_for(dir.path());
    match registry.parse("proto/absent.proto").unwrap_err() {
        ParseError::NotFound { file, tried } => {
            assert_eq!(file, "proto/absent.proto");
            assert_eq!(tried.len(), 1);
            assert!(tried[0].ends_with("/absent.proto"), "{tried:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_syntax_error_carries_position() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.proto", "syntax = \"proto3\";\n\nmessage Broken {\n  int32 = 1;\n}\n");
    let registry = registry_for(dir.path());
    let err = registry.parse("proto/broken.proto").unwrap_err();
    assert!(matches!(err, ParseError::Syntax { line: 4, column: 9, .. }), "{err}");
    assert!(err.to_string().starts_with("proto/broken.proto:4:9:"), "{err}");
}

#[test]
fn test_reload_picks_up_edits_atomically() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "common.proto", COMMON);
    write(dir.path(), "order.proto", ORDER);

    let registry = registry_for(dir.path());
    registry.parse("proto/order.proto").unwrap();
    let before = registry.snapshot();

    // A broken edit is rejected and the old pool keeps serving.
    write(dir.path(), "common.proto", "syntax = \"proto3\"; package acme.common; message Money {");
    assert!(registry.reload().is_err());
    assert!(Arc::ptr_eq(&before, &registry.snapshot()));

    // A valid edit is published.
    write(
        dir.path(),
        "common.proto",
        "syntax = \"proto3\"; package acme.common; message Money { string currency = 1; int64 units = 2; int32 nanos = 3; }",
    );
    registry.reload().unwrap();
    let after = registry.snapshot();
    assert_eq!(after.message("acme.common.Money").unwrap().field_count(), 3);
    assert_eq!(before.message("acme.common.Money").unwrap().field_count(), 2);
}

#[test]
fn test_readers_see_whole_pools_during_reload() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "common.proto", COMMON);
    write(dir.path(), "order.proto", ORDER);
    let registry = Arc::new(registry_for(dir.path()));
    registry.parse("proto/order.proto").unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    let pool = registry.snapshot();
                    // Both files are always present together.
                    assert!(pool.contains("acme.shop.Order"));
                    assert!(pool.contains("acme.common.Money"));
                }
            })
        })
        .collect();
    for _ in 0..20 {
        registry.reload().unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
}
