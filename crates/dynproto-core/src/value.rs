//! # Dynamic Values — The Host-Side Representation
//!
//! `DynamicValue` is what a scripting host hands to `encode`/`pack` and
//! gets back from `create`/`decode`/`unpack`. It mirrors the shapes a
//! dynamically-typed language offers: nil, booleans, numbers, strings,
//! ordered sequences and associative tables.
//!
//! Two table shapes are kept apart:
//!
//! - `Message` is keyed by field name and preserves insertion order, so a
//!   decoded message lists its fields in declaration order.
//! - `Map` is keyed by a scalar [`MapKey`] and iterates in key order, which
//!   gives map fields a stable encoding within (and across) calls.
//!
//! Values are plain trees. Nothing here can form a cycle.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::kind::ScalarKind;

/// A dynamically-typed value exchanged with the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    /// Absent. A message entry holding `Nil` counts as not present.
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Ordered sequence; the value of a repeated field.
    List(Vec<DynamicValue>),
    /// Scalar-keyed table; the value of a map field.
    Map(BTreeMap<MapKey, DynamicValue>),
    /// Field-name-keyed table; the value of a message.
    Message(IndexMap<String, DynamicValue>),
}

/// The key of a map-field entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
}

impl DynamicValue {
    /// An empty message table.
    pub fn message() -> Self {
        Self::Message(IndexMap::new())
    }

    /// The zero value of a scalar kind, which is also its proto3 default.
    ///
    /// Every integral kind yields `Int`.
    pub fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Double | ScalarKind::Float => Self::Float(0.0),
            ScalarKind::Bool => Self::Bool(false),
            ScalarKind::String => Self::Str(String::new()),
            ScalarKind::Bytes => Self::Bytes(Vec::new()),
            _ => Self::Int(0),
        }
    }

    /// Short name of this value's shape, used in type mismatch reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Message(_) => "message",
        }
    }

    /// True for `Nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Field lookup on a message; `None` for other shapes, missing keys and
    /// `Nil` entries alike.
    pub fn get(&self, field: &str) -> Option<&DynamicValue> {
        match self {
            Self::Message(fields) => fields.get(field).filter(|v| !v.is_nil()),
            _ => None,
        }
    }

    /// Mutable field lookup on a message.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut DynamicValue> {
        match self {
            Self::Message(fields) => fields.get_mut(field),
            _ => None,
        }
    }

    /// Set a field on a message, returning the previous value. Has no
    /// effect on other shapes.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<DynamicValue>) -> Option<DynamicValue> {
        match self {
            Self::Message(fields) => fields.insert(field.into(), value.into()),
            _ => None,
        }
    }

    /// Integer view of numeric values without loss; `None` otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => i64::try_from(*n).ok(),
            Self::Float(x) if x.fract() == 0.0 && *x >= -(2f64.powi(63)) && *x < 2f64.powi(63) => {
                Some(*x as i64)
            }
            _ => None,
        }
    }

    /// Borrow the text of a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON for hosts that speak it.
    ///
    /// Bytes become a string when they are valid UTF-8 and an array of
    /// octets otherwise; map keys are stringified; non-finite floats become
    /// `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Nil => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(n) => Json::from(*n),
            Self::UInt(n) => Json::from(*n),
            Self::Float(x) => serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.clone()),
            Self::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => Json::String(s.to_owned()),
                Err(_) => Json::Array(b.iter().map(|o| Json::from(*o)).collect()),
            },
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Json::Object(
                entries.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
            Self::Message(fields) => Json::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<Json> for DynamicValue {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Nil,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(fields) => {
                Self::Message(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// `Int` when the value fits in `i64`; `UInt` is reserved for the upper half.
impl From<u64> for DynamicValue {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::UInt(n),
        }
    }
}

impl From<u64> for MapKey {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::UInt(n),
        }
    }
}

impl From<f64> for DynamicValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<u8>> for DynamicValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(items: Vec<DynamicValue>) -> Self {
        Self::List(items)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<MapKey> for DynamicValue {
    fn from(key: MapKey) -> Self {
        match key {
            MapKey::Bool(b) => Self::Bool(b),
            MapKey::Int(n) => Self::Int(n),
            MapKey::UInt(n) => Self::UInt(n),
            MapKey::Str(s) => Self::Str(s),
        }
    }
}

/// Build a `DynamicValue::Message` from `name => value` pairs.
///
/// ```
/// use dynproto_core::{message, DynamicValue};
///
/// let person = message! { "name" => "Alice", "id" => 7 };
/// assert_eq!(person.get("id"), Some(&DynamicValue::Int(7)));
/// ```
#[macro_export]
macro_rules! message {
    () => { $crate::DynamicValue::message() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut m = $crate::DynamicValue::message();
        $( m.set($name, $value); )+
        m
    }};
}
