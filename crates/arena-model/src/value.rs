//! Scalar value coercion helpers shared by the typed entity views.
//!
//! Getters are deliberately permissive: a field holding a value of an
//! unexpected JSON type reads as `None` rather than failing, matching the
//! schemaless store underneath.

use serde_json::Value;

pub(crate) fn as_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

pub(crate) fn as_i64(value: Option<Value>) -> Option<i64> {
    value.and_then(|v| v.as_i64())
}

pub(crate) fn as_f64(value: Option<Value>) -> Option<f64> {
    value.and_then(|v| v.as_f64())
}
