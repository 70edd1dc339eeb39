//! # Serialization Formats
//!
//! Abstraction over the serialization formats a connection can speak.
//! Supports JSON (default, human-readable) and CBOR (compact binary).
//!
//! ## Features
//! - **Mime type keyed**: each format is identified by the mime type clients know it by
//! - **Frame kind**: JSON travels in text frames, CBOR in binary frames
//! - **Format agnostic values**: both formats decode into [`crate::core::value::Value`]
//!
//! ## Usage
//! ```
//! use overpass_server::core::serialization::{MultiFormat, SerializationFormat};
//! use overpass_server::core::value::{self, Value};
//!
//! let value = value::map([("blob", Value::Bytes(vec![1, 2, 3]))]);
//! let bytes = value.serialize_format(SerializationFormat::Cbor).unwrap();
//! let back = Value::deserialize_format(&bytes, SerializationFormat::Cbor).unwrap();
//! assert_eq!(value, back);
//! ```

use crate::core::value::Value;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Mime type of the JSON format
pub const MIME_JSON: &str = "application/json";
/// Mime type of the CBOR format
pub const MIME_CBOR: &str = "application/cbor";

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SerializationFormat {
    /// Human-readable JSON text (default, debugging)
    #[default]
    Json,
    /// Compact binary CBOR
    Cbor,
}

impl SerializationFormat {
    /// Mime type this format is registered under
    pub fn mime_type(self) -> &'static str {
        match self {
            SerializationFormat::Json => MIME_JSON,
            SerializationFormat::Cbor => MIME_CBOR,
        }
    }

    /// Look a format up by mime type
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            MIME_JSON => Some(SerializationFormat::Json),
            MIME_CBOR => Some(SerializationFormat::Cbor),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Json => "JSON",
            SerializationFormat::Cbor => "CBOR",
        }
    }

    /// Whether encoded output is UTF-8 text and belongs in a text frame
    pub fn is_text(self) -> bool {
        matches!(self, SerializationFormat::Json)
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        match format {
            SerializationFormat::Json => serde_json::to_vec(self)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::Cbor => {
                let mut buf = Vec::new();
                ciborium::into_writer(self, &mut buf)
                    .map_err(|e| ProtocolError::SerializeError(format!("{e:?}")))?;
                Ok(buf)
            }
        }
    }

    /// Deserialize from bytes using the specified format.
    ///
    /// `data` must hold exactly one item; trailing bytes are a decode error.
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DecodeError(e.to_string())),
            SerializationFormat::Cbor => {
                let mut cursor = Cursor::new(data);
                let value = ciborium::from_reader(&mut cursor)
                    .map_err(|e| ProtocolError::DecodeError(format!("{e:?}")))?;
                let consumed = cursor.position() as usize;
                if consumed != data.len() {
                    return Err(ProtocolError::DecodeError(format!(
                        "{} trailing bytes after CBOR item",
                        data.len() - consumed
                    )));
                }
                Ok(value)
            }
        }
    }
}

impl MultiFormat for Value {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::from_json;
    use serde_json::json;

    #[test]
    fn test_mime_type_lookup() {
        for format in [SerializationFormat::Json, SerializationFormat::Cbor] {
            assert_eq!(
                SerializationFormat::from_mime_type(format.mime_type()),
                Some(format)
            );
        }
        assert_eq!(SerializationFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SerializationFormat::Json.name(), "JSON");
        assert_eq!(SerializationFormat::Cbor.name(), "CBOR");
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Json);
        assert!(SerializationFormat::Json.is_text());
        assert!(!SerializationFormat::Cbor.is_text());
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_sizes() {
        let value = from_json(json!({"type": "command.response", "seq": 12, "payload": [1, 2, 3]}));

        let json_size = value
            .serialize_format(SerializationFormat::Json)
            .expect("json")
            .len();
        let cbor_size = value
            .serialize_format(SerializationFormat::Cbor)
            .expect("cbor")
            .len();

        assert!(cbor_size < json_size);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let result = Value::deserialize_format(b"{not json", SerializationFormat::Json);
        assert!(matches!(result, Err(ProtocolError::DecodeError(_))));

        let result = Value::deserialize_format(&[0xff, 0xff], SerializationFormat::Cbor);
        assert!(matches!(result, Err(ProtocolError::DecodeError(_))));
    }

    #[test]
    fn test_cbor_rejects_trailing_bytes() {
        // 0x01 is a complete item; the rest must not be ignored
        let result = Value::deserialize_format(&[0x01, 0xff, 0xff, 0xff], SerializationFormat::Cbor);
        match result {
            Err(ProtocolError::DecodeError(msg)) => assert!(msg.contains("3 trailing bytes")),
            other => panic!("expected decode error, got {other:?}"),
        }

        let value = Value::deserialize_format(&[0x01], SerializationFormat::Cbor);
        assert_eq!(value.ok(), Some(Value::Integer(1.into())));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_cbor_keeps_bytes_tags_and_integer_keys() {
        let value = Value::Map(vec![
            (Value::Integer(1.into()), Value::Bytes(vec![0, 159, 255])),
            (
                Value::Text("when".into()),
                Value::Tag(1, Box::new(Value::Integer(1_700_000_000.into()))),
            ),
        ]);
        let bytes = value
            .serialize_format(SerializationFormat::Cbor)
            .expect("cbor");
        let back = Value::deserialize_format(&bytes, SerializationFormat::Cbor).expect("decode");
        assert_eq!(back, value);
    }
}
