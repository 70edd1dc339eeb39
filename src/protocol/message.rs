//! Logical protocol messages exchanged after the handshake.
//!
//! A [`Message`] is format independent. The marshallers in [`crate::core`] turn it
//! into a header plus an optional payload and back.

use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Wire tag of a command request.
pub const COMMAND_REQUEST: &str = "command.request";
/// Wire tag of a command response.
pub const COMMAND_RESPONSE: &str = "command.response";

/// Outcome class of a command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Success,
    Failure,
    Error,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Success => "success",
            ResponseType::Failure => "failure",
            ResponseType::Error => "error",
        }
    }
}

/// A request to run `command` in `namespace`.
///
/// `session` is opaque to the server and only echoed back. A request without
/// `seq` is fire-and-forget: it runs but never produces a response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub session: Value,
    pub seq: Option<u64>,
    pub namespace: String,
    pub command: String,
    pub payload: Option<Value>,
}

/// The part of a request every response must echo back.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub session: Value,
    pub seq: Option<u64>,
}

impl CommandRequest {
    pub fn correlation(&self) -> Correlation {
        Correlation {
            session: self.session.clone(),
            seq: self.seq,
        }
    }
}

/// A response correlated to a request through `session` and `seq`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub session: Value,
    pub seq: Option<u64>,
    pub response_type: ResponseType,
    pub payload: Option<Value>,
}

impl CommandResponse {
    pub fn success(correlation: &Correlation, payload: Value) -> Self {
        Self {
            session: correlation.session.clone(),
            seq: correlation.seq,
            response_type: ResponseType::Success,
            payload: Some(payload),
        }
    }

    pub fn failure(correlation: &Correlation, payload: Value) -> Self {
        Self {
            session: correlation.session.clone(),
            seq: correlation.seq,
            response_type: ResponseType::Failure,
            payload: Some(payload),
        }
    }

    /// Error responses never carry a payload.
    pub fn error(correlation: &Correlation) -> Self {
        Self {
            session: correlation.session.clone(),
            seq: correlation.seq,
            response_type: ResponseType::Error,
            payload: None,
        }
    }
}

/// Every message shape the engine can decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CommandRequest(CommandRequest),
    CommandResponse(CommandResponse),
    /// A well-formed message with a type this server does not handle yet.
    /// Decoded so it can be ignored; it can never be marshalled.
    Unknown {
        message_type: String,
        session: Value,
        seq: Option<u64>,
    },
}

impl Message {
    /// Wire tag of this message.
    pub fn message_type(&self) -> &str {
        match self {
            Message::CommandRequest(_) => COMMAND_REQUEST,
            Message::CommandResponse(_) => COMMAND_RESPONSE,
            Message::Unknown { message_type, .. } => message_type,
        }
    }

    pub fn session(&self) -> &Value {
        match self {
            Message::CommandRequest(r) => &r.session,
            Message::CommandResponse(r) => &r.session,
            Message::Unknown { session, .. } => session,
        }
    }

    pub fn seq(&self) -> Option<u64> {
        match self {
            Message::CommandRequest(r) => r.seq,
            Message::CommandResponse(r) => r.seq,
            Message::Unknown { seq, .. } => *seq,
        }
    }
}

impl From<CommandRequest> for Message {
    fn from(request: CommandRequest) -> Self {
        Message::CommandRequest(request)
    }
}

impl From<CommandResponse> for Message {
    fn from(response: CommandResponse) -> Self {
        Message::CommandResponse(response)
    }
}
