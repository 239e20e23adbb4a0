//! # Value Coercion
//!
//! Conversions between host values and wire scalars. Encoding is strict
//! about shape and range: an integer field accepts any number that holds
//! an integral value within the field's range, and nothing else. Numeric
//! strings are not parsed. Decoding is total.

use dynproto_core::wire::ScalarValue;
use dynproto_core::{DynamicValue, EnumDescriptor, MapKey, ScalarKind};

/// Integral view of a numeric value, wide enough for every field kind.
fn integral(value: &DynamicValue) -> Option<i128> {
    match value {
        DynamicValue::Int(n) => Some(i128::from(*n)),
        DynamicValue::UInt(n) => Some(i128::from(*n)),
        DynamicValue::Float(x) if x.is_finite() && x.fract() == 0.0 => {
            (*x >= -(2f64.powi(63)) && *x < 2f64.powi(64)).then_some(*x as i128)
        }
        _ => None,
    }
}

fn float(value: &DynamicValue) -> Option<f64> {
    match value {
        DynamicValue::Int(n) => Some(*n as f64),
        DynamicValue::UInt(n) => Some(*n as f64),
        DynamicValue::Float(x) => Some(*x),
        _ => None,
    }
}

/// Coerce a host value to a scalar of `kind`, or `None` if it does not fit.
pub(crate) fn scalar(kind: ScalarKind, value: &DynamicValue) -> Option<ScalarValue> {
    match kind {
        ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => {
            integral(value).and_then(|n| i32::try_from(n).ok()).map(ScalarValue::I32)
        }
        ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => {
            integral(value).and_then(|n| i64::try_from(n).ok()).map(ScalarValue::I64)
        }
        ScalarKind::UInt32 | ScalarKind::Fixed32 => {
            integral(value).and_then(|n| u32::try_from(n).ok()).map(ScalarValue::U32)
        }
        ScalarKind::UInt64 | ScalarKind::Fixed64 => {
            integral(value).and_then(|n| u64::try_from(n).ok()).map(ScalarValue::U64)
        }
        ScalarKind::Double => float(value).map(ScalarValue::F64),
        ScalarKind::Float => float(value).map(|x| ScalarValue::F32(x as f32)),
        ScalarKind::Bool => match value {
            DynamicValue::Bool(b) => Some(ScalarValue::Bool(*b)),
            _ => None,
        },
        ScalarKind::String => match value {
            DynamicValue::Str(s) => Some(ScalarValue::String(s.clone())),
            DynamicValue::Bytes(b) => String::from_utf8(b.clone()).ok().map(ScalarValue::String),
            _ => None,
        },
        ScalarKind::Bytes => match value {
            DynamicValue::Bytes(b) => Some(ScalarValue::Bytes(b.clone())),
            DynamicValue::Str(s) => Some(ScalarValue::Bytes(s.as_bytes().to_vec())),
            _ => None,
        },
    }
}

/// Coerce a host value to an enum number: an `int32` value or the name of
/// a declared value.
pub(crate) fn enum_number(descriptor: &EnumDescriptor, value: &DynamicValue) -> Option<i32> {
    match value {
        DynamicValue::Str(name) => descriptor.number_of(name),
        other => integral(other).and_then(|n| i32::try_from(n).ok()),
    }
}

/// Coerce a key of a `Map` value to the declared key kind.
pub(crate) fn map_key(kind: ScalarKind, key: &MapKey) -> Option<ScalarValue> {
    scalar(kind, &DynamicValue::from(key.clone()))
}

/// Convert the field-name-style key of a `Message`-shaped map value.
///
/// Hosts that only have string-keyed tables (JSON objects) write integer
/// and bool keys as text; those are parsed back here.
pub(crate) fn map_key_from_name(kind: ScalarKind, name: &str) -> Option<ScalarValue> {
    match kind {
        ScalarKind::String => Some(ScalarValue::String(name.to_string())),
        ScalarKind::Bool => match name {
            "true" => Some(ScalarValue::Bool(true)),
            "false" => Some(ScalarValue::Bool(false)),
            _ => None,
        },
        _ if kind.is_integral() => {
            let n = name.parse::<i128>().ok()?;
            let value = match i64::try_from(n) {
                Ok(n) => DynamicValue::Int(n),
                Err(_) => DynamicValue::UInt(u64::try_from(n).ok()?),
            };
            scalar(kind, &value)
        }
        _ => None,
    }
}

/// Host value of a decoded scalar.
pub(crate) fn to_value(scalar: ScalarValue) -> DynamicValue {
    match scalar {
        ScalarValue::Bool(b) => DynamicValue::Bool(b),
        ScalarValue::I32(n) => DynamicValue::Int(i64::from(n)),
        ScalarValue::I64(n) => DynamicValue::Int(n),
        ScalarValue::U32(n) => DynamicValue::Int(i64::from(n)),
        ScalarValue::U64(n) => DynamicValue::from(n),
        ScalarValue::F32(x) => DynamicValue::Float(f64::from(x)),
        ScalarValue::F64(x) => DynamicValue::Float(x),
        ScalarValue::String(s) => DynamicValue::Str(s),
        ScalarValue::Bytes(b) => DynamicValue::Bytes(b),
    }
}

/// Map key of a decoded key scalar. `None` for kinds that cannot be keys.
pub(crate) fn to_map_key(scalar: ScalarValue) -> Option<MapKey> {
    match scalar {
        ScalarValue::Bool(b) => Some(MapKey::Bool(b)),
        ScalarValue::I32(n) => Some(MapKey::Int(i64::from(n))),
        ScalarValue::I64(n) => Some(MapKey::Int(n)),
        ScalarValue::U32(n) => Some(MapKey::Int(i64::from(n))),
        ScalarValue::U64(n) => Some(MapKey::from(n)),
        ScalarValue::String(s) => Some(MapKey::Str(s)),
        ScalarValue::F32(_) | ScalarValue::F64(_) | ScalarValue::Bytes(_) => None,
    }
}

/// Whether a scalar equals its kind's zero default. Negative zero is not
/// zero, so it survives an implicit-presence round trip.
pub(crate) fn is_zero(scalar: &ScalarValue) -> bool {
    match scalar {
        ScalarValue::Bool(b) => !b,
        ScalarValue::I32(n) => *n == 0,
        ScalarValue::I64(n) => *n == 0,
        ScalarValue::U32(n) => *n == 0,
        ScalarValue::U64(n) => *n == 0,
        ScalarValue::F32(x) => x.to_bits() == 0,
        ScalarValue::F64(x) => x.to_bits() == 0,
        ScalarValue::String(s) => s.is_empty(),
        ScalarValue::Bytes(b) => b.is_empty(),
    }
}

/// Description of an offending value for mismatch reports.
pub(crate) fn describe(value: &DynamicValue) -> String {
    match value {
        DynamicValue::Bool(b) => format!("bool {b}"),
        DynamicValue::Int(n) => format!("integer {n}"),
        DynamicValue::UInt(n) => format!("unsigned integer {n}"),
        DynamicValue::Float(x) => format!("float {x}"),
        DynamicValue::Str(s) if s.chars().count() <= 32 => format!("string {s:?}"),
        other => other.type_name().to_string(),
    }
}
