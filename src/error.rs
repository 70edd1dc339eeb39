//! # Error Types
//!
//! Error handling for the protocol engine.
//!
//! This module defines the errors that can occur below the command boundary:
//! transport I/O, frame decoding, marshalling, configuration and service startup.
//! Errors raised *by* command handlers live in [`crate::protocol::failure`] because
//! they are converted into responses instead of being propagated.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and listener failures
//! - **Codec Errors**: malformed inbound frames, unserializable outbound messages
//! - **Routing Errors**: unknown namespace or command (see [`RoutingError`])
//! - **Startup Errors**: configuration problems, service readiness failures
//!
//! ## Example Usage
//! ```rust
//! use overpass_server::error::{ProtocolError, Result};
//!
//! fn port_from(value: &str) -> Result<u16> {
//!     value
//!         .parse()
//!         .map_err(|e| ProtocolError::ConfigError(format!("invalid port: {e}")))
//! }
//!
//! assert!(port_from("8080").is_ok());
//! assert!(port_from("http").is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_EMPTY_FRAME: &str = "Empty frame";
    pub const ERR_TRUNCATED_HEADER: &str = "Frame shorter than its header length prefix";
    pub const ERR_NOT_AN_OBJECT: &str = "Message is not a structured object";
    pub const ERR_MISSING_TYPE: &str = "Message has no type";

    /// Configuration errors
    pub const ERR_PORT_REQUIRED: &str = "PORT must be defined";
}

/// ProtocolError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("Unknown serialization: {0}")]
    UnknownSerialization(String),

    #[error("Service '{namespace}' failed to start: {reason}")]
    ServiceStart { namespace: String, reason: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Reason a request could not be routed to a command handler.
///
/// The `Display` output never contains anything beyond the names the client
/// itself sent, so it is safe to log alongside the `error` response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Undefined namespace '{namespace}'.")]
    UnknownNamespace { namespace: String },

    #[error("Undefined command '{command}' in namespace '{namespace}'.")]
    UnknownCommand { namespace: String, command: String },
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
