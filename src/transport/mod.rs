//! # Transports
//!
//! Anything that is a `Stream` of inbound [`Frame`](crate::core::frame::Frame)s
//! and a `Sink` for outbound ones can carry a connection session.
//!
//! ## Components
//! - **WebSocket**: `tokio-tungstenite` server accept and client connect
//! - **Memory**: channel pair for in-process clients and tests

pub mod memory;
pub mod websocket;

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use futures::{Sink, Stream};

/// A bidirectional frame transport.
pub trait Transport:
    Stream<Item = Result<Frame>> + Sink<Frame, Error = ProtocolError> + Send + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame>> + Sink<Frame, Error = ProtocolError> + Send + 'static
{
}
