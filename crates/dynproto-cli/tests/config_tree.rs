//! Integration test: a YAML configuration pointing at a schema tree on
//! disk, driven through the same handlers the binary dispatches to.

use std::fs;

use dynproto_cli::commands::{self, DecodeArgs, EncodeArgs, NameArgs};
use dynproto_cli::config::CliConfig;

const COMMON: &str = r#"
syntax = "proto2";
package acme;
enum Level { LOW = 1; HIGH = 2; }
"#;

const ALERT: &str = r#"
syntax = "proto2";
package acme;
import "defs/common.proto";
message Alert {
  required string text = 1;
  optional Level level = 2 [default = HIGH];
  repeated int32 codes = 3 [packed = true];
}
"#;

fn setup() -> (tempfile::TempDir, CliConfig) {
    let dir = tempfile::tempdir().unwrap();
    let schemas = dir.path().join("schemas");
    fs::create_dir(&schemas).unwrap();
    fs::write(schemas.join("common.proto"), COMMON).unwrap();
    fs::write(schemas.join("alert.proto"), ALERT).unwrap();

    let yaml = format!(
        "paths:\n  - virtual: defs\n    real: {}\nschemas:\n  - defs/alert.proto\nmarshal:\n  enums_as_names: true\n",
        schemas.display()
    );
    let config_path = dir.path().join("dynproto.yaml");
    fs::write(&config_path, yaml).unwrap();
    let config = CliConfig::load(&config_path).unwrap();
    (dir, config)
}

#[test]
fn test_config_loads_imports_through_mapping() {
    let (_dir, config) = setup();
    let host = config.build_host().unwrap();
    let mut out: Vec<u8> = Vec::new();
    commands::check(&host, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "acme.Alert\n");
    assert!(host.registry().snapshot().enum_type("acme.Level").is_some());
}

#[test]
fn test_proto2_defaults_and_enum_names() {
    let (dir, config) = setup();
    let host = config.build_host().unwrap();

    let mut out: Vec<u8> = Vec::new();
    commands::create(&host, &NameArgs { name: "acme.Alert".into() }, &mut out).unwrap();
    let created: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(created, serde_json::json!({ "text": "", "level": "HIGH", "codes": [] }));

    let input = dir.path().join("alert.json");
    fs::write(&input, r#"{"text": "disk", "level": "LOW", "codes": [1, 2]}"#).unwrap();
    let mut hex_out: Vec<u8> = Vec::new();
    commands::encode(&host, &EncodeArgs { name: "acme.Alert".into(), input: Some(input), hex: true }, &mut hex_out)
        .unwrap();
    assert_eq!(String::from_utf8(hex_out.clone()).unwrap(), "0a046469736b10011a020102\n");

    let wire = dir.path().join("alert.hex");
    fs::write(&wire, &hex_out).unwrap();
    let mut json_out: Vec<u8> = Vec::new();
    commands::decode(&host, &DecodeArgs { name: "acme.Alert".into(), input: Some(wire), hex: true }, &mut json_out)
        .unwrap();
    let decoded: serde_json::Value = serde_json::from_slice(&json_out).unwrap();
    assert_eq!(decoded, serde_json::json!({ "text": "disk", "level": "LOW", "codes": [1, 2] }));
}

#[test]
fn test_missing_schema_fails_build() {
    let (_dir, mut config) = setup();
    config.extend(&[], &["defs/nope.proto".to_string()]).unwrap();
    let err = config.build_host().unwrap_err();
    assert!(err.to_string().contains("defs/nope.proto"));
}
