// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Canonical text form of parameter values
//!
//! Compact JSON with object keys sorted by byte order at every depth. Arrays
//! keep their order. Numbers use `serde_json`'s rendering: plain decimal for
//! integers, shortest round-trip form for floats, no locale involvement.
//!
//! Sorting is done here rather than relying on `serde_json::Map` ordering,
//! which changes when any crate in the build enables `preserve_order`.

use serde_json::Value;

use crate::errors::KeyError;

/// Renders `value` in canonical form
pub(crate) fn to_canonical_string(value: &Value) -> Result<String, KeyError> {
    let mut out = String::with_capacity(64);
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), KeyError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out)?;
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> Result<(), KeyError> {
    let escaped = serde_json::to_string(s).map_err(KeyError::unserializable)?;
    out.push_str(&escaped);
    Ok(())
}
