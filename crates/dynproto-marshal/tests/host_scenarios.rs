//! Integration test: the host call surface end to end, over schema files
//! on disk and in memory.

use std::fs;
use std::sync::Arc;
use std::thread;

use dynproto_core::{message, DynamicValue};
use dynproto_marshal::{MarshalConfig, ProtoHost};
use dynproto_schema::{MemorySourceTree, SchemaRegistry};

const PERSON_V1: &str = r#"
syntax = "proto3";
package demo;

message Person {
  string name = 1;
  int32 id = 2;
  string email = 3;
}
"#;

const PERSON_V2: &str = r#"
syntax = "proto3";
package demo;

enum Role {
  ROLE_UNSPECIFIED = 0;
  ADMIN = 1;
}

message Phone {
  string number = 1;
}

message Person {
  string name = 1;
  int32 id = 2;
  string email = 3;
  repeated Phone phones = 4;
  Role role = 5;
  map<string, string> tags = 6;
  fixed64 joined = 7;
}
"#;

fn memory_host(text: &str) -> ProtoHost {
    let tree = MemorySourceTree::new();
    tree.insert("person.proto", text);
    let host = ProtoHost::with_registry(SchemaRegistry::with_source_tree(Arc::new(tree)), MarshalConfig::default());
    assert!(host.parse("person.proto"));
    host
}

#[test]
fn test_person_scenario() {
    let host = memory_host(PERSON_V1);

    let mut person = host.create("demo.Person").unwrap();
    person.set("name", "Alice");
    person.set("id", 7);
    person.set("email", "a@x.com");

    let bytes = host.encode("demo.Person", &person).unwrap();
    let mut expected = vec![0x0a, 0x05];
    expected.extend_from_slice(b"Alice");
    expected.extend_from_slice(&[0x10, 0x07, 0x1a, 0x07]);
    expected.extend_from_slice(b"a@x.com");
    assert_eq!(bytes, expected);

    assert_eq!(host.decode("demo.Person", &bytes), Some(person));
    assert_eq!(
        host.unpack("demo.Person", &bytes),
        Some(vec![DynamicValue::from("Alice"), DynamicValue::Int(7), DynamicValue::from("a@x.com")])
    );
    assert_eq!(host.pack("demo.Person", &["Alice".into(), 7.into(), "a@x.com".into()]), Some(bytes));
}

#[test]
fn test_newer_writer_older_reader() {
    let writer = memory_host(PERSON_V2);
    let reader = memory_host(PERSON_V1);

    let value = message! {
        "name" => "Bob",
        "id" => 3,
        "phones" => vec![message! { "number" => "555" }],
        "role" => "ADMIN",
        "tags" => message! { "team" => "core" },
        "joined" => 1_700_000_000u64,
    };
    let bytes = writer.encode("demo.Person", &value).unwrap();

    let old = reader.decode("demo.Person", &bytes).unwrap();
    assert_eq!(old, message! { "name" => "Bob", "id" => 3, "email" => "" });

    let fields = reader.unpack("demo.Person", &bytes).unwrap();
    assert_eq!(fields.len(), 3);

    let new = writer.decode("demo.Person", &bytes).unwrap();
    assert_eq!(new.get("joined"), Some(&DynamicValue::Int(1_700_000_000)));
    assert_eq!(writer.encode("demo.Person", &new), Some(bytes));
}

#[test]
fn test_older_writer_newer_reader() {
    let writer = memory_host(PERSON_V1);
    let reader = memory_host(PERSON_V2);

    let bytes = writer.encode("demo.Person", &message! { "name" => "Eve" }).unwrap();
    let value = reader.decode("demo.Person", &bytes).unwrap();
    assert_eq!(value.get("name"), Some(&DynamicValue::from("Eve")));
    assert_eq!(value.get("phones"), Some(&DynamicValue::List(vec![])));
    assert_eq!(value.get("role"), Some(&DynamicValue::Int(0)));
    assert_eq!(value.get("joined"), Some(&DynamicValue::Int(0)));
}

#[test]
fn test_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("person.proto"), PERSON_V1).unwrap();

    let host = ProtoHost::new(MarshalConfig::default());
    host.map_path("schemas", dir.path().to_str().unwrap());
    assert!(host.parse("schemas/person.proto"));
    assert!(!host.exist("demo.Phone"));

    fs::write(dir.path().join("person.proto"), PERSON_V2).unwrap();
    // Parsing a loaded file again does not pick up edits; reload does.
    assert!(host.parse("schemas/person.proto"));
    assert!(!host.exist("demo.Phone"));
    assert!(host.reload());
    assert!(host.exist("demo.Phone"));
    assert_eq!(host.create("demo.Person").map(|p| p.get("phones").cloned()), Some(Some(DynamicValue::List(vec![]))));

    fs::write(dir.path().join("person.proto"), "syntax = \"proto3\"; message {").unwrap();
    assert!(!host.reload());
    assert!(host.exist("demo.Phone"));
    assert!(host.encode("demo.Person", &message! { "role" => "ADMIN" }).is_some());

    fs::remove_file(dir.path().join("person.proto")).unwrap();
    assert!(!host.reload());
    assert!(host.exist("demo.Person"));
}

#[test]
fn test_calls_during_reload() {
    let tree = MemorySourceTree::new();
    tree.insert("person.proto", PERSON_V1);
    let host = Arc::new(ProtoHost::with_registry(
        SchemaRegistry::with_source_tree(Arc::new(tree.clone())),
        MarshalConfig::default(),
    ));
    assert!(host.parse("person.proto"));

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let host = Arc::clone(&host);
            thread::spawn(move || {
                for n in 0..200 {
                    let value = message! { "name" => format!("r{i}"), "id" => n };
                    let bytes = host.encode("demo.Person", &value).unwrap();
                    let back = host.decode("demo.Person", &bytes).unwrap();
                    assert_eq!(back.get("id"), Some(&DynamicValue::Int(i64::from(n))));
                }
            })
        })
        .collect();

    for round in 0..20 {
        tree.insert("person.proto", if round % 2 == 0 { PERSON_V2 } else { PERSON_V1 });
        assert!(host.reload());
    }
    for reader in readers {
        reader.join().unwrap();
    }
}
