//! Property tests: any well-typed value survives encode/decode and
//! pack/unpack unchanged, over every scalar kind plus containers. Fields
//! left out come back as the values `create` gives them.

use std::collections::BTreeMap;
use std::sync::Arc;

use dynproto_core::{DynamicValue, MapKey};
use dynproto_marshal::{MarshalConfig, Marshaler};
use dynproto_schema::{DescriptorPool, MemorySourceTree, SchemaRegistry};
use indexmap::IndexMap;
use proptest::prelude::*;

const SCHEMA: &str = r#"
syntax = "proto3";
package rt;

message Inner {
  string label = 1;
  sint64 delta = 2;
}

message Everything {
  double f_double = 1;
  float f_float = 2;
  int32 f_int32 = 3;
  int64 f_int64 = 4;
  uint32 f_uint32 = 5;
  uint64 f_uint64 = 6;
  sint32 f_sint32 = 7;
  sint64 f_sint64 = 8;
  fixed32 f_fixed32 = 9;
  fixed64 f_fixed64 = 10;
  sfixed32 f_sfixed32 = 11;
  sfixed64 f_sfixed64 = 12;
  bool f_bool = 13;
  string f_string = 14;
  bytes f_bytes = 15;
  repeated int32 f_list = 16;
  map<string, int64> f_map = 17;
  Inner f_inner = 18;
  repeated Inner f_inners = 19;
}
"#;

const NAMES: [&str; 19] = [
    "f_double", "f_float", "f_int32", "f_int64", "f_uint32", "f_uint64", "f_sint32", "f_sint64", "f_fixed32",
    "f_fixed64", "f_sfixed32", "f_sfixed64", "f_bool", "f_string", "f_bytes", "f_list", "f_map", "f_inner",
    "f_inners",
];

fn pool() -> Arc<DescriptorPool> {
    let tree = MemorySourceTree::new();
    tree.insert("rt.proto", SCHEMA);
    let registry = SchemaRegistry::with_source_tree(Arc::new(tree));
    registry.parse("rt.proto").unwrap();
    registry.snapshot()
}

/// The fields of a freshly created `rt.Everything`, in declaration order.
fn created(m: &Marshaler<'_>) -> IndexMap<String, DynamicValue> {
    match m.create("rt.Everything").unwrap() {
        DynamicValue::Message(fields) => fields,
        other => panic!("create returned {other:?}"),
    }
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |f| f.is_finite())
}

fn finite_f32() -> impl Strategy<Value = f64> {
    any::<f32>().prop_filter("finite", |f| f.is_finite()).prop_map(f64::from)
}

fn inner() -> impl Strategy<Value = DynamicValue> {
    ("\\PC{0,8}", any::<i64>()).prop_map(|(label, delta)| {
        let mut fields = IndexMap::new();
        fields.insert("label".to_string(), DynamicValue::Str(label));
        fields.insert("delta".to_string(), DynamicValue::Int(delta));
        DynamicValue::Message(fields)
    })
}

/// One value per field of `rt.Everything`, in declaration order.
fn everything() -> impl Strategy<Value = Vec<DynamicValue>> {
    let scalars = (
        finite_f64(),
        finite_f32(),
        any::<i32>(),
        any::<i64>(),
        any::<u32>(),
        any::<u64>(),
        any::<i32>(),
        any::<i64>(),
        any::<u32>(),
        any::<u64>(),
        any::<i32>(),
        any::<i64>(),
    );
    let rest = (
        any::<bool>(),
        "\\PC{0,16}",
        proptest::collection::vec(any::<u8>(), 0..16),
        proptest::collection::vec(any::<i32>(), 0..8),
        proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..4),
        inner(),
        proptest::collection::vec(inner(), 0..3),
    );
    (scalars, rest).prop_map(|(s, r)| {
        let map: BTreeMap<MapKey, DynamicValue> =
            r.4.into_iter().map(|(k, v)| (MapKey::Str(k), DynamicValue::Int(v))).collect();
        vec![
            DynamicValue::Float(s.0),
            DynamicValue::Float(s.1),
            DynamicValue::Int(i64::from(s.2)),
            DynamicValue::Int(s.3),
            DynamicValue::Int(i64::from(s.4)),
            DynamicValue::from(s.5),
            DynamicValue::Int(i64::from(s.6)),
            DynamicValue::Int(s.7),
            DynamicValue::Int(i64::from(s.8)),
            DynamicValue::from(s.9),
            DynamicValue::Int(i64::from(s.10)),
            DynamicValue::Int(s.11),
            DynamicValue::Bool(r.0),
            DynamicValue::Str(r.1),
            DynamicValue::Bytes(r.2),
            DynamicValue::List(r.3.into_iter().map(|n| DynamicValue::Int(i64::from(n))).collect()),
            DynamicValue::Map(map),
            r.5,
            DynamicValue::List(r.6),
        ]
    })
}

proptest! {
    #[test]
    fn named_roundtrip(values in everything()) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);

        let message = DynamicValue::Message(
            NAMES.iter().map(|n| n.to_string()).zip(values).collect(),
        );
        let bytes = m.encode("rt.Everything", &message).unwrap();
        prop_assert_eq!(m.decode("rt.Everything", &bytes).unwrap(), message);
    }

    #[test]
    fn positional_roundtrip(values in everything()) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);

        let bytes = m.pack("rt.Everything", &values).unwrap();
        prop_assert_eq!(m.unpack("rt.Everything", &bytes).unwrap(), values);
    }

    #[test]
    fn named_and_positional_agree(values in everything()) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);

        let message = DynamicValue::Message(
            NAMES.iter().map(|n| n.to_string()).zip(values.iter().cloned()).collect(),
        );
        prop_assert_eq!(m.encode("rt.Everything", &message).unwrap(), m.pack("rt.Everything", &values).unwrap());
    }

    #[test]
    fn named_missing_fields_match_create(
        values in everything(),
        keep in proptest::collection::vec(any::<bool>(), NAMES.len()),
    ) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);

        let mut expected = created(&m);
        let mut sparse = IndexMap::new();
        for ((name, value), kept) in NAMES.iter().zip(values).zip(keep) {
            if kept {
                expected.insert(name.to_string(), value.clone());
                sparse.insert(name.to_string(), value);
            }
        }
        let bytes = m.encode("rt.Everything", &DynamicValue::Message(sparse)).unwrap();
        prop_assert_eq!(m.decode("rt.Everything", &bytes).unwrap(), DynamicValue::Message(expected));
    }

    #[test]
    fn positional_prefix_gets_trailing_defaults(values in everything(), len in 0..=NAMES.len()) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);

        let bytes = m.pack("rt.Everything", &values[..len]).unwrap();
        let mut expected = values[..len].to_vec();
        expected.extend(created(&m).into_values().skip(len));
        prop_assert_eq!(m.unpack("rt.Everything", &bytes).unwrap(), expected);
    }

    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
        let pool = pool();
        let config = MarshalConfig::default();
        let m = Marshaler::new(&pool, &config);
        let _ = m.decode("rt.Everything", &bytes);
        let _ = m.unpack("rt.Everything", &bytes);
    }
}
