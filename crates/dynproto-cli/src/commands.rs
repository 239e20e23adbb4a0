//! # Subcommands
//!
//! Argument structs and handlers. Handlers write results to the given
//! writer and leave diagnostics to `tracing`, so stdout carries only the
//! payload and can be piped.
//!
//! Host values travel as JSON: objects are messages, arrays are repeated
//! fields, and `bytes` fields render as a string when they hold UTF-8.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use dynproto_core::DynamicValue;
use dynproto_marshal::ProtoHost;
use serde_json::Value as Json;

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Fully qualified message name, e.g. `shop.Order`.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    pub name: String,

    /// JSON object to encode. Reads stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Print hex instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    pub name: String,

    /// Wire bytes to decode. Reads stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Input is hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    pub name: String,

    /// Field values in declaration order, each a JSON value.
    pub values: Vec<String>,

    /// Print hex instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
}

/// `check`: list every loaded message, one per line.
pub fn check(host: &ProtoHost, out: &mut dyn Write) -> anyhow::Result<()> {
    let pool = host.registry().snapshot();
    for name in pool.message_names() {
        writeln!(out, "{name}")?;
    }
    tracing::info!(files = pool.file_count(), schemas = pool.len(), "schemas checked");
    Ok(())
}

/// `exist`: prints `true` or `false`; absent schemas fail the command.
pub fn exist(host: &ProtoHost, args: &NameArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let found = host.exist(&args.name);
    writeln!(out, "{found}")?;
    if !found {
        bail!("schema '{}' is not loaded", args.name);
    }
    Ok(())
}

pub fn create(host: &ProtoHost, args: &NameArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let value = host.try_create(&args.name)?;
    write_json(out, &value.to_json())
}

pub fn encode(host: &ProtoHost, args: &EncodeArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let input = read_input(args.input.as_deref())?;
    let json: Json = serde_json::from_slice(&input).context("input is not valid JSON")?;
    let bytes = host.try_encode(&args.name, &DynamicValue::from(json))?;
    write_bytes(out, &bytes, args.hex)
}

pub fn decode(host: &ProtoHost, args: &DecodeArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let bytes = read_bytes(args.input.as_deref(), args.hex)?;
    let value = host.try_decode(&args.name, &bytes)?;
    write_json(out, &value.to_json())
}

pub fn pack(host: &ProtoHost, args: &PackArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let values = args
        .values
        .iter()
        .enumerate()
        .map(|(i, text)| {
            serde_json::from_str::<Json>(text)
                .map(DynamicValue::from)
                .with_context(|| format!("argument {} is not valid JSON: {text}", i + 1))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let bytes = host.try_pack(&args.name, &values)?;
    write_bytes(out, &bytes, args.hex)
}

pub fn unpack(host: &ProtoHost, args: &DecodeArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let bytes = read_bytes(args.input.as_deref(), args.hex)?;
    let values = host.try_unpack(&args.name, &bytes)?;
    write_json(out, &Json::Array(values.iter().map(DynamicValue::to_json).collect()))
}

fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn read_bytes(path: Option<&Path>, is_hex: bool) -> anyhow::Result<Vec<u8>> {
    let input = read_input(path)?;
    if is_hex {
        decode_hex(&input)
    } else {
        Ok(input)
    }
}

/// Hex text with whitespace anywhere ignored, in either case.
fn decode_hex(text: &[u8]) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = text.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    hex::decode(digits).context("invalid hex input")
}

fn write_bytes(out: &mut dyn Write, bytes: &[u8], as_hex: bool) -> anyhow::Result<()> {
    if as_hex {
        writeln!(out, "{}", hex::encode(bytes))?;
    } else {
        out.write_all(bytes)?;
    }
    Ok(())
}

fn write_json(out: &mut dyn Write, json: &Json) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, json)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynproto_marshal::MarshalConfig;
    use dynproto_schema::{MemorySourceTree, SchemaRegistry};

    use super::*;

    const SHOP: &str = r#"
        syntax = "proto3";
        package shop;
        message Item { string sku = 1; uint32 qty = 2; }
        message Order { string id = 1; repeated Item items = 2; bytes note = 3; }
    "#;

    fn host() -> ProtoHost {
        let tree = MemorySourceTree::new();
        tree.insert("shop.proto", SHOP);
        let host = ProtoHost::with_registry(SchemaRegistry::with_source_tree(Arc::new(tree)), MarshalConfig::default());
        host.try_parse("shop.proto").unwrap();
        host
    }

    fn run(f: impl FnOnce(&mut dyn Write) -> anyhow::Result<()>) -> String {
        let mut out: Vec<u8> = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_check_lists_messages() {
        let host = host();
        assert_eq!(run(|out| check(&host, out)), "shop.Item\nshop.Order\n");
    }

    #[test]
    fn test_exist() {
        let host = host();
        let found = NameArgs { name: "shop.Item".into() };
        assert_eq!(run(|out| exist(&host, &found, out)), "true\n");
        let missing = NameArgs { name: "shop.Cart".into() };
        assert!(exist(&host, &missing, &mut Vec::<u8>::new()).is_err());
    }

    #[test]
    fn test_create_prints_defaults() {
        let host = host();
        let text = run(|out| create(&host, &NameArgs { name: "shop.Item".into() }, out));
        let json: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(json, serde_json::json!({ "sku": "", "qty": 0 }));
    }

    #[test]
    fn test_encode_then_decode_files() {
        let host = host();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("order.json");
        std::fs::write(&input, r#"{"id": "o-1", "items": [{"sku": "A", "qty": 2}], "note": "hi"}"#).unwrap();

        let args = EncodeArgs { name: "shop.Order".into(), input: Some(input), hex: true };
        let hex_text = run(|out| encode(&host, &args, out));
        assert_eq!(hex_text, "0a036f2d3112050a014110021a026869\n");

        let wire = dir.path().join("order.hex");
        std::fs::write(&wire, &hex_text).unwrap();
        let args = DecodeArgs { name: "shop.Order".into(), input: Some(wire), hex: true };
        let json: Json = serde_json::from_str(&run(|out| decode(&host, &args, out))).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "o-1", "items": [{ "sku": "A", "qty": 2 }], "note": "hi" }));
    }

    #[test]
    fn test_pack_and_unpack() {
        let host = host();
        let args = PackArgs { name: "shop.Item".into(), values: vec!["\"A\"".into(), "2".into()], hex: false };
        let mut bytes = Vec::new();
        pack(&host, &args, &mut bytes).unwrap();
        assert_eq!(bytes, [0x0a, 0x01, b'A', 0x10, 0x02]);

        let dir = tempfile::tempdir().unwrap();
        let wire = dir.path().join("item.bin");
        std::fs::write(&wire, &bytes).unwrap();
        let args = DecodeArgs { name: "shop.Item".into(), input: Some(wire), hex: false };
        let json: Json = serde_json::from_str(&run(|out| unpack(&host, &args, out))).unwrap();
        assert_eq!(json, serde_json::json!(["A", 2]));
    }

    #[test]
    fn test_hex_input_ignores_whitespace_and_case() {
        assert_eq!(decode_hex(b"0A 05\nff\n").unwrap(), vec![0x0a, 0x05, 0xff]);
        assert_eq!(decode_hex(b"").unwrap(), Vec::<u8>::new());
        assert!(decode_hex(b"abc").is_err());
        assert!(decode_hex(b"zz").is_err());
    }

    #[test]
    fn test_pack_rejects_bad_arguments() {
        let host = host();
        let not_json = PackArgs { name: "shop.Item".into(), values: vec!["A".into()], hex: false };
        let err = pack(&host, &not_json, &mut Vec::<u8>::new()).unwrap_err();
        assert!(err.to_string().contains("argument 1"));

        let too_many = PackArgs { name: "shop.Item".into(), values: vec!["1".into(); 3], hex: false };
        assert!(pack(&host, &too_many, &mut Vec::<u8>::new()).is_err());
    }
}
