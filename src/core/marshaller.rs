//! # Message Marshalling
//!
//! Turns logical [`Message`]s into wire bytes and back.
//!
//! A message is split into a [`Header`] (type, session, seq and the routing
//! fields of its type) and an optional payload. Each part is serialized on its
//! own and the two are combined according to the format:
//!
//! ## Wire Format
//! ```text
//! JSON:  { ...header fields, "payload": <payload> }          (one text document)
//! CBOR:  [HeaderLen(4, big endian)] [Header(HeaderLen)] [Payload(rest)]
//! ```
//!
//! An empty CBOR payload segment means the message has no payload. The length
//! prefix lets the unmarshaller split the frame without ever looking inside the
//! payload. Each CBOR segment must hold exactly one item.
//!
//! Sessions and payloads are [`Value`]s. CBOR carries them unchanged; JSON
//! only carries what a JSON document can express and rejects map keys it
//! cannot render as strings.

use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::core::value::{self, Value};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{
    CommandRequest, CommandResponse, Message, ResponseType, COMMAND_REQUEST, COMMAND_RESPONSE,
};
use serde::{Deserialize, Serialize};

/// Size of the CBOR header length prefix
pub const HEADER_LENGTH_PREFIX: usize = 4;

/// Everything about a message except its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(default = "value::null")]
    pub session: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(
        rename = "responseType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_type: Option<ResponseType>,
}

impl MultiFormat for Header {}

impl Header {
    /// Split a message into its header and payload.
    ///
    /// # Errors
    /// `UnsupportedMessageType` for messages of a type this server cannot emit.
    pub fn split(message: &Message) -> Result<(Header, Option<&Value>)> {
        match message {
            Message::CommandRequest(req) => Ok((
                Header {
                    message_type: COMMAND_REQUEST.to_string(),
                    session: req.session.clone(),
                    seq: req.seq,
                    namespace: Some(req.namespace.clone()),
                    command: Some(req.command.clone()),
                    response_type: None,
                },
                req.payload.as_ref(),
            )),
            Message::CommandResponse(resp) => {
                let payload = match resp.response_type {
                    ResponseType::Error => None,
                    _ => resp.payload.as_ref(),
                };
                Ok((
                    Header {
                        message_type: COMMAND_RESPONSE.to_string(),
                        session: resp.session.clone(),
                        seq: resp.seq,
                        namespace: None,
                        command: None,
                        response_type: Some(resp.response_type),
                    },
                    payload,
                ))
            }
            Message::Unknown { message_type, .. } => {
                Err(ProtocolError::UnsupportedMessageType(message_type.clone()))
            }
        }
    }

    /// Rebuild a message from a decoded header and payload.
    pub fn join(self, payload: Option<Value>) -> Result<Message> {
        match self.message_type.as_str() {
            COMMAND_REQUEST => {
                let namespace = self.namespace.ok_or_else(|| {
                    ProtocolError::DecodeError("command.request without namespace".into())
                })?;
                let command = self.command.ok_or_else(|| {
                    ProtocolError::DecodeError("command.request without command".into())
                })?;
                Ok(Message::CommandRequest(CommandRequest {
                    session: self.session,
                    seq: self.seq,
                    namespace,
                    command,
                    payload,
                }))
            }
            COMMAND_RESPONSE => {
                let response_type = self.response_type.ok_or_else(|| {
                    ProtocolError::DecodeError("command.response without responseType".into())
                })?;
                Ok(Message::CommandResponse(CommandResponse {
                    session: self.session,
                    seq: self.seq,
                    response_type,
                    payload,
                }))
            }
            _ => Ok(Message::Unknown {
                message_type: self.message_type,
                session: self.session,
                seq: self.seq,
            }),
        }
    }
}

/// Builds wire bytes for messages in one format.
#[derive(Debug, Clone, Copy)]
pub struct MessageMarshaller {
    format: SerializationFormat,
}

impl MessageMarshaller {
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn marshal(&self, message: &Message) -> Result<Vec<u8>> {
        let (header, payload) = Header::split(message)?;

        match self.format {
            SerializationFormat::Json => {
                let mut document = serde_json::to_value(&header)
                    .map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
                if let (serde_json::Value::Object(map), Some(payload)) = (&mut document, payload) {
                    let payload = serde_json::to_value(payload)
                        .map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
                    map.insert("payload".to_string(), payload);
                }
                serde_json::to_vec(&document)
                    .map_err(|e| ProtocolError::SerializeError(e.to_string()))
            }
            SerializationFormat::Cbor => {
                let header = header.serialize_format(self.format)?;
                let header_len = u32::try_from(header.len()).map_err(|_| {
                    ProtocolError::SerializeError(format!(
                        "header of {} bytes does not fit the length prefix",
                        header.len()
                    ))
                })?;
                let payload = match payload {
                    Some(payload) => payload.serialize_format(self.format)?,
                    None => Vec::new(),
                };

                let mut frame =
                    Vec::with_capacity(HEADER_LENGTH_PREFIX + header.len() + payload.len());
                frame.extend_from_slice(&header_len.to_be_bytes());
                frame.extend_from_slice(&header);
                frame.extend_from_slice(&payload);
                Ok(frame)
            }
        }
    }
}

/// Parses wire bytes into messages in one format.
#[derive(Debug, Clone, Copy)]
pub struct MessageUnmarshaller {
    format: SerializationFormat,
}

impl MessageUnmarshaller {
    pub fn new(format: SerializationFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn unmarshal(&self, data: &[u8]) -> Result<Message> {
        if data.is_empty() {
            return Err(ProtocolError::DecodeError(constants::ERR_EMPTY_FRAME.into()));
        }

        match self.format {
            SerializationFormat::Json => {
                let mut document: serde_json::Value = serde_json::from_slice(data)
                    .map_err(|e| ProtocolError::DecodeError(e.to_string()))?;
                let map = document.as_object_mut().ok_or_else(|| {
                    ProtocolError::DecodeError(constants::ERR_NOT_AN_OBJECT.into())
                })?;
                if !map.contains_key("type") {
                    return Err(ProtocolError::DecodeError(
                        constants::ERR_MISSING_TYPE.into(),
                    ));
                }
                let payload = map.remove("payload").map(value::from_json);
                let header: Header = serde_json::from_value(document)
                    .map_err(|e| ProtocolError::DecodeError(e.to_string()))?;
                header.join(payload)
            }
            SerializationFormat::Cbor => {
                if data.len() < HEADER_LENGTH_PREFIX {
                    return Err(ProtocolError::DecodeError(
                        constants::ERR_TRUNCATED_HEADER.into(),
                    ));
                }
                let (prefix, rest) = data.split_at(HEADER_LENGTH_PREFIX);
                let header_len =
                    u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
                if rest.len() < header_len {
                    return Err(ProtocolError::DecodeError(format!(
                        "{}: expected {header_len} header bytes, got {}",
                        constants::ERR_TRUNCATED_HEADER,
                        rest.len()
                    )));
                }
                let (header, payload) = rest.split_at(header_len);
                let header = Header::deserialize_format(header, self.format)?;
                let payload = if payload.is_empty() {
                    None
                } else {
                    Some(Value::deserialize_format(payload, self.format)?)
                };
                header.join(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::core::value::from_json;
    use serde_json::json;

    fn success_response() -> Message {
        Message::CommandResponse(CommandResponse {
            session: Value::Text("s1".into()),
            seq: Some(1),
            response_type: ResponseType::Success,
            payload: Some(from_json(json!({"echo": {"a": 1}}))),
        })
    }

    #[test]
    fn json_response_is_a_single_flat_document() {
        let bytes = MessageMarshaller::new(SerializationFormat::Json)
            .marshal(&success_response())
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            doc,
            json!({
                "type": "command.response",
                "responseType": "success",
                "session": "s1",
                "seq": 1,
                "payload": {"echo": {"a": 1}}
            })
        );
    }

    #[test]
    fn json_request_parses_from_client_document() {
        let raw = br#"{"type":"command.request","session":"s1","seq":1,"namespace":"echo.1","command":"success","payload":{"a":1}}"#;
        let msg = MessageUnmarshaller::new(SerializationFormat::Json)
            .unmarshal(raw)
            .unwrap();
        assert_eq!(
            msg,
            Message::CommandRequest(CommandRequest {
                session: Value::Text("s1".into()),
                seq: Some(1),
                namespace: "echo.1".into(),
                command: "success".into(),
                payload: Some(from_json(json!({"a": 1}))),
            })
        );
    }

    #[test]
    fn error_response_drops_payload_in_both_formats() {
        let msg = Message::CommandResponse(CommandResponse {
            session: Value::Integer(5.into()),
            seq: Some(9),
            response_type: ResponseType::Error,
            payload: Some(from_json(json!({"leak": "internal"}))),
        });

        let json_bytes = MessageMarshaller::new(SerializationFormat::Json)
            .marshal(&msg)
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&json_bytes).unwrap();
        assert!(doc.get("payload").is_none());

        let cbor = MessageMarshaller::new(SerializationFormat::Cbor)
            .marshal(&msg)
            .unwrap();
        let header_len = u32::from_be_bytes([cbor[0], cbor[1], cbor[2], cbor[3]]) as usize;
        assert_eq!(cbor.len(), HEADER_LENGTH_PREFIX + header_len);
    }

    #[test]
    fn cbor_frame_is_length_prefixed() {
        let bytes = MessageMarshaller::new(SerializationFormat::Cbor)
            .marshal(&success_response())
            .unwrap();
        let header_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let header =
            Header::deserialize_format(&bytes[4..4 + header_len], SerializationFormat::Cbor)
                .unwrap();
        assert_eq!(header.message_type, COMMAND_RESPONSE);
        assert_eq!(header.response_type, Some(ResponseType::Success));

        let payload =
            Value::deserialize_format(&bytes[4 + header_len..], SerializationFormat::Cbor)
                .unwrap();
        assert_eq!(payload, from_json(json!({"echo": {"a": 1}})));
    }

    #[test]
    fn cbor_carries_values_json_cannot() {
        let session = Value::Tag(37, Box::new(Value::Bytes(vec![0xab; 16])));
        let payload = Value::Map(vec![
            (Value::Integer(1.into()), Value::Bytes(vec![0, 1, 2, 255])),
            (Value::Bool(true), Value::Tag(32, Box::new(Value::Text("x".into())))),
        ]);
        let msg = Message::CommandRequest(CommandRequest {
            session: session.clone(),
            seq: Some(4),
            namespace: "blob.1".into(),
            command: "put".into(),
            payload: Some(payload.clone()),
        });

        let bytes = MessageMarshaller::new(SerializationFormat::Cbor)
            .marshal(&msg)
            .unwrap();
        let back = MessageUnmarshaller::new(SerializationFormat::Cbor)
            .unmarshal(&bytes)
            .unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.session(), &session);
    }

    #[test]
    fn json_rejects_non_text_map_keys() {
        let msg = Message::CommandResponse(CommandResponse {
            session: Value::Null,
            seq: Some(1),
            response_type: ResponseType::Success,
            payload: Some(Value::Map(vec![(
                Value::Array(vec![]),
                Value::Null,
            )])),
        });
        let result = MessageMarshaller::new(SerializationFormat::Json).marshal(&msg);
        assert!(matches!(result, Err(ProtocolError::SerializeError(_))));
    }

    #[test]
    fn cbor_segments_reject_trailing_bytes() {
        let bytes = MessageMarshaller::new(SerializationFormat::Cbor)
            .marshal(&success_response())
            .unwrap();
        let cbor = MessageUnmarshaller::new(SerializationFormat::Cbor);

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0xff, 0xff, 0xff]);
        assert!(matches!(
            cbor.unmarshal(&padded),
            Err(ProtocolError::DecodeError(_))
        ));

        // same header with one garbage byte appended inside its declared length
        let header_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let mut header_padded = ((header_len + 1) as u32).to_be_bytes().to_vec();
        header_padded.extend_from_slice(&bytes[4..4 + header_len]);
        header_padded.push(0x00);
        header_padded.extend_from_slice(&bytes[4 + header_len..]);
        assert!(matches!(
            cbor.unmarshal(&header_padded),
            Err(ProtocolError::DecodeError(_))
        ));
    }

    #[test]
    fn unknown_type_cannot_be_marshalled() {
        let msg = Message::Unknown {
            message_type: "event.publish".into(),
            session: Value::Null,
            seq: None,
        };
        let result = MessageMarshaller::new(SerializationFormat::Json).marshal(&msg);
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedMessageType(t)) if t == "event.publish"
        ));
    }

    #[test]
    fn unknown_type_still_decodes() {
        let raw = br#"{"type":"event.publish","session":"s1","payload":[1]}"#;
        let msg = MessageUnmarshaller::new(SerializationFormat::Json)
            .unmarshal(raw)
            .unwrap();
        assert_eq!(msg.message_type(), "event.publish");
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        let json = MessageUnmarshaller::new(SerializationFormat::Json);
        let cases: [&[u8]; 4] = [b"", b"not json", b"[1,2]", br#"{"session":"s1"}"#];
        for raw in cases {
            assert!(
                matches!(json.unmarshal(raw), Err(ProtocolError::DecodeError(_))),
                "expected decode error for {raw:?}"
            );
        }

        let request_without_command = br#"{"type":"command.request","namespace":"echo.1"}"#;
        assert!(matches!(
            json.unmarshal(request_without_command),
            Err(ProtocolError::DecodeError(_))
        ));

        let cbor = MessageUnmarshaller::new(SerializationFormat::Cbor);
        assert!(matches!(
            cbor.unmarshal(&[0, 0]),
            Err(ProtocolError::DecodeError(_))
        ));
        assert!(matches!(
            cbor.unmarshal(&[0, 0, 0, 200, 1, 2, 3]),
            Err(ProtocolError::DecodeError(_))
        ));
    }
}
