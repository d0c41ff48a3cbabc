//! Type-directed literal rendering.

use std::fmt::Write;

use crate::value::{TIMESTAMP_FORMAT, Value};

/// Render a value as an inline SQL literal.
///
/// Every typed case is matched before the stringify fallback; the
/// fallback quotes and escapes its output like a string.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => quote(s),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::I8(_)
        | Value::I16(_)
        | Value::I32(_)
        | Value::I64(_)
        | Value::U8(_)
        | Value::U16(_)
        | Value::U32(_)
        | Value::U64(_) => value.to_string(),
        Value::F32(n) => render_float(f64::from(*n), || n.to_string()),
        Value::F64(n) => render_float(*n, || n.to_string()),
        Value::Timestamp(ts) => format!("'{}'", ts.format(TIMESTAMP_FORMAT)),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 5);
            out.push_str("E'\\x");
            for b in bytes {
                // Writing into a String cannot fail.
                let _ = write!(out, "{:02x}", b);
            }
            out.push('\'');
            out
        }
        Value::Uuid(_) | Value::Json(_) | Value::Vector(_) => quote(&value.to_string()),
    }
}

/// [`render_value`] for servers that treat `\\` as an escape inside
/// string literals (MySQL without `NO_BACKSLASH_ESCAPES`): backslashes
/// are doubled along with quotes.
pub fn render_value_escaping_backslashes(value: &Value) -> String {
    match value {
        Value::String(s) => quote(&s.replace('\\', "\\\\")),
        Value::Uuid(_) | Value::Json(_) | Value::Vector(_) => {
            quote(&value.to_string().replace('\\', "\\\\"))
        }
        _ => render_value(value),
    }
}

/// Single-quote a string, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn render_float(n: f64, shortest: impl FnOnce() -> String) -> String {
    if n.is_nan() {
        "'NaN'".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "'Infinity'" } else { "'-Infinity'" }.to_string()
    } else {
        shortest()
    }
}
