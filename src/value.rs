//! Typed literal values.
//!
//! A [`Value`] is the raw literal plus its logical type. The type tag
//! ([`ValueKind`]) feeds the fingerprint; the dialect decides how the
//! literal is rendered.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{SqlError, SqlResult};

/// Timestamp layout shared by rendering and fingerprinting.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    /// Timestamp without zone; zoned inputs are normalized to UTC.
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// Embedding vector (pgvector / TiDB VECTOR).
    Vector(Vec<f32>),
}

/// Logical type discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Timestamp,
    Bytes,
    Uuid,
    Json,
    Vector,
}

impl ValueKind {
    /// Stable name folded into fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::String => "string",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Bytes => "bytes",
            ValueKind::Uuid => "uuid",
            ValueKind::Json => "json",
            ValueKind::Vector => "vector",
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::String(_) => ValueKind::String,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Json(_) => ValueKind::Json,
            Value::Vector(_) => ValueKind::Vector,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Any integer width, widened.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::I8(n) => Some(n.into()),
            Value::I16(n) => Some(n.into()),
            Value::I32(n) => Some(n.into()),
            Value::I64(n) => Some(n.into()),
            Value::U8(n) => Some(n.into()),
            Value::U16(n) => Some(n.into()),
            Value::U32(n) => Some(n.into()),
            Value::U64(n) => Some(n.into()),
            _ => None,
        }
    }
}

/// Canonical, locale-independent text form. Fingerprints hash this.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Json(j) => write!(f, "{}", j),
            Value::Vector(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    NaiveDateTime => Timestamp,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    serde_json::Value => Json,
    Vec<f32> => Vector,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(dt: DateTime<Tz>) -> Self {
        Value::Timestamp(dt.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Conversion from a decoded column value into a Rust field type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> SqlResult<Self>;
}

fn mismatch(expected: &str, got: &Value) -> SqlError {
    SqlError::Execution(format!(
        "cannot convert {} value into {}",
        got.kind().as_str(),
        expected
    ))
}

macro_rules! impl_from_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> SqlResult<Self> {
                    let wide = value
                        .as_i128()
                        .ok_or_else(|| mismatch(stringify!($ty), &value))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        SqlError::Execution(format!(
                            "integer {} out of range for {}",
                            wide,
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::F64(n) => Ok(n),
            Value::F32(n) => Ok(n.into()),
            ref other => other
                .as_i128()
                .map(|n| n as f64)
                .ok_or_else(|| mismatch("f64", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::F32(n) => Ok(n),
            Value::F64(n) => Ok(n as f32),
            ref other => Err(mismatch("f32", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            // MySQL reports BOOLEAN columns as TINYINT.
            ref other => match other.as_i128() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(mismatch("bool", other)),
            },
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(s.into_bytes()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::String(s) => NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
                .map_err(|e| SqlError::Execution(format!("invalid timestamp '{}': {}", s, e))),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::String(s) => Uuid::parse_str(&s)
                .map_err(|e| SqlError::Execution(format!("invalid uuid '{}': {}", s, e))),
            other => Err(mismatch("Uuid", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Json(j) => Ok(j),
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|e| SqlError::Execution(format!("invalid json: {}", e))),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl FromValue for Vec<f32> {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Vector(v) => Ok(v),
            other => Err(mismatch("Vec<f32>", &other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> SqlResult<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> SqlResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
