//! Serialization registry: mime type to marshaller/unmarshaller pairs.
//!
//! Fixed once the server is constructed and shared read-only by every
//! connection.

use crate::core::frame::Frame;
use crate::core::marshaller::{MessageMarshaller, MessageUnmarshaller};
use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use bytes::Bytes;
use std::collections::HashMap;

/// A marshaller/unmarshaller pair registered under one mime type.
#[derive(Debug, Clone)]
pub struct MessageSerialization {
    mime_type: String,
    marshaller: MessageMarshaller,
    unmarshaller: MessageUnmarshaller,
}

impl MessageSerialization {
    pub fn new(format: SerializationFormat) -> Self {
        Self {
            mime_type: format.mime_type().to_string(),
            marshaller: MessageMarshaller::new(format),
            unmarshaller: MessageUnmarshaller::new(format),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn format(&self) -> SerializationFormat {
        self.marshaller.format()
    }

    /// Marshal a message into the frame kind its format travels in.
    pub fn encode(&self, message: &Message) -> Result<Frame> {
        let bytes = self.marshaller.marshal(message)?;
        if self.format().is_text() {
            String::from_utf8(bytes)
                .map(Frame::Text)
                .map_err(|e| ProtocolError::SerializeError(e.to_string()))
        } else {
            Ok(Frame::Binary(Bytes::from(bytes)))
        }
    }

    /// Unmarshal the content of a text or binary frame.
    pub fn decode(&self, frame: &Frame) -> Result<Message> {
        self.unmarshaller.unmarshal(frame.as_bytes())
    }
}

/// Every serialization the server knows, plus the one connections use.
#[derive(Debug, Clone)]
pub struct SerializationRegistry {
    entries: HashMap<String, MessageSerialization>,
    default_mime_type: String,
}

impl Default for SerializationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationRegistry {
    /// Registry holding JSON and CBOR with JSON as the default.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for format in [SerializationFormat::Json, SerializationFormat::Cbor] {
            let serialization = MessageSerialization::new(format);
            entries.insert(serialization.mime_type().to_string(), serialization);
        }
        Self {
            entries,
            default_mime_type: SerializationFormat::default().mime_type().to_string(),
        }
    }

    /// Pick the serialization every connection will use.
    ///
    /// # Errors
    /// `UnknownSerialization` if nothing is registered under `mime_type`.
    pub fn with_default(mut self, mime_type: &str) -> Result<Self> {
        if !self.entries.contains_key(mime_type) {
            return Err(ProtocolError::UnknownSerialization(mime_type.to_string()));
        }
        self.default_mime_type = mime_type.to_string();
        Ok(self)
    }

    pub fn get(&self, mime_type: &str) -> Option<&MessageSerialization> {
        self.entries.get(mime_type)
    }

    pub fn default_mime_type(&self) -> &str {
        &self.default_mime_type
    }

    /// Serialization used for new connections.
    pub fn default_serialization(&self) -> Result<&MessageSerialization> {
        self.get(&self.default_mime_type)
            .ok_or_else(|| ProtocolError::UnknownSerialization(self.default_mime_type.clone()))
    }

    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::serialization::{MIME_CBOR, MIME_JSON};
    use crate::core::value::Value;
    use crate::protocol::message::{CommandRequest, CommandResponse};

    #[test]
    fn registry_defaults_to_json() {
        let registry = SerializationRegistry::new();
        assert_eq!(registry.default_mime_type(), MIME_JSON);
        assert_eq!(
            registry.default_serialization().unwrap().format(),
            SerializationFormat::Json
        );
        let mut mimes: Vec<_> = registry.mime_types().collect();
        mimes.sort_unstable();
        assert_eq!(mimes, vec![MIME_CBOR, MIME_JSON]);
    }

    #[test]
    fn unknown_default_is_rejected() {
        let result = SerializationRegistry::new().with_default("application/xml");
        assert!(matches!(result, Err(ProtocolError::UnknownSerialization(_))));
    }

    #[test]
    fn frame_kind_follows_format() {
        let request = CommandRequest {
            session: Value::Text("s".into()),
            seq: Some(1),
            namespace: "echo.1".into(),
            command: "success".into(),
            payload: None,
        };
        let message = Message::from(CommandResponse::error(&request.correlation()));

        let registry = SerializationRegistry::new().with_default(MIME_CBOR).unwrap();
        let cbor = registry.default_serialization().unwrap();
        let frame = cbor.encode(&message).unwrap();
        assert!(matches!(frame, Frame::Binary(_)));
        assert_eq!(cbor.decode(&frame).unwrap(), message);

        let json = registry.get(MIME_JSON).unwrap();
        let frame = json.encode(&message).unwrap();
        assert!(matches!(frame, Frame::Text(_)));
        assert_eq!(json.decode(&frame).unwrap(), message);
    }
}
