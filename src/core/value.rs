//! # Payload Values
//!
//! Sessions and payloads are carried as [`ciborium::Value`], the CBOR data
//! model. It is a superset of JSON: byte strings, tags and non-text map keys
//! survive a CBOR round trip unchanged. The JSON format covers the subset it
//! can express and converts at the edge with [`from_json`].
//!
//! ```
//! use overpass_server::core::value::{self, Value};
//! use serde_json::json;
//!
//! let payload = value::from_json(json!({"echo": [1, "two"]}));
//! assert_eq!(value::get(&payload, "echo").map(|v| v.is_array()), Some(true));
//!
//! let blob = value::map([("blob", Value::Bytes(vec![0xde, 0xad]))]);
//! assert_eq!(value::Diagnostic(&blob).to_string(), "{\"blob\": h'dead'}");
//! ```

use std::fmt;

pub use ciborium::Value;

/// `null`, the session of a message that carried none.
pub fn null() -> Value {
    Value::Null
}

/// Convert a parsed JSON document.
///
/// Integers stay integers; every other number becomes a float.
pub fn from_json(json: serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::Integer(u.into())
            } else if let Some(i) = n.as_i64() {
                Value::Integer(i.into())
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::Text(s),
        Json::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k), from_json(v)))
                .collect(),
        ),
    }
}

/// Build a map with text keys.
pub fn map<K, I>(entries: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k.into()), v))
            .collect(),
    )
}

/// Look up a text key in a map value.
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Renders a value in CBOR diagnostic notation for logs.
#[derive(Clone, Copy)]
pub struct Diagnostic<'a>(pub &'a Value);

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Integer(i) => write!(f, "{}", i128::from(*i)),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bytes(bytes) => {
                f.write_str("h'")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Tag(tag, inner) => write!(f, "{tag}({})", Diagnostic(inner)),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Diagnostic(item))?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", Diagnostic(k), Diagnostic(v))?;
                }
                f.write_str("}")
            }
            _ => f.write_str("undefined"),
        }
    }
}

impl fmt::Debug for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
