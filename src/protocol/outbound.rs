//! Outbound send path of one connection.
//!
//! Dispatch tasks never touch the transport. They push frames into an
//! unbounded channel drained by the connection's writer task; once the
//! connection is closed the channel is closed too and sends fail with
//! [`ProtocolError::ConnectionClosed`].

use crate::core::frame::Frame;
use crate::core::registry::MessageSerialization;
use crate::core::value::Diagnostic;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use crate::utils::Metrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Cloneable handle used to write to one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    connection_seq: u64,
    serialization: Arc<MessageSerialization>,
    tx: mpsc::UnboundedSender<Frame>,
    metrics: Arc<Metrics>,
}

impl Outbound {
    pub fn new(
        connection_seq: u64,
        serialization: Arc<MessageSerialization>,
        tx: mpsc::UnboundedSender<Frame>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            connection_seq,
            serialization,
            tx,
            metrics,
        }
    }

    pub fn connection_seq(&self) -> u64 {
        self.connection_seq
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// True once the connection's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Marshal and queue a message.
    pub fn send(&self, message: &Message) -> Result<()> {
        let frame = self.serialization.encode(message)?;
        debug!(
            connection = self.connection_seq,
            session = %Diagnostic(message.session()),
            seq = ?message.seq(),
            frame = %frame.describe(),
            "send"
        );
        self.send_frame(frame)
    }

    /// Queue a raw frame.
    pub fn send_frame(&self, frame: Frame) -> Result<()> {
        let len = frame.len() as u64;
        self.tx
            .send(frame)
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        self.metrics.frame_sent(len);
        Ok(())
    }
}
