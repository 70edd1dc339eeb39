//! Per-connection state machine.
//!
//! ```text
//! AwaitingHandshake --first frame--> Active --transport close / decode error--> Closed
//! ```
//!
//! The session owns the read path of one transport and spawns a writer task
//! that owns the write path. Inbound frames are decoded in arrival order;
//! each request is dispatched on its own task and the read loop never waits
//! for it, so responses leave in whatever order handlers finish.

use crate::config::MAX_FRAME_SIZE;
use crate::core::frame::Frame;
use crate::core::registry::MessageSerialization;
use crate::core::value::Diagnostic;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake;
use crate::protocol::message::Message;
use crate::protocol::outbound::Outbound;
use crate::transport::Transport;
use crate::utils::Metrics;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Closed,
}

/// What the read loop should do after handling a frame.
enum Flow {
    Continue,
    Close,
}

/// One live connection.
#[derive(Debug)]
pub struct ConnectionSession {
    connection_seq: u64,
    state: SessionState,
    dispatcher: Dispatcher,
    serialization: Arc<MessageSerialization>,
    metrics: Arc<Metrics>,
}

impl ConnectionSession {
    pub fn new(
        connection_seq: u64,
        dispatcher: Dispatcher,
        serialization: Arc<MessageSerialization>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            connection_seq,
            state: SessionState::AwaitingHandshake,
            dispatcher,
            serialization,
            metrics,
        }
    }

    pub fn connection_seq(&self) -> u64 {
        self.connection_seq
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the connection until the transport closes. Returns the final
    /// state, which is always [`SessionState::Closed`].
    #[instrument(name = "connection", skip_all, fields(connection = self.connection_seq))]
    pub async fn run<T: Transport>(mut self, transport: T) -> SessionState {
        let connection = self.connection_seq;
        let (mut sink, mut stream) = transport.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let outbound = Outbound::new(
            connection,
            Arc::clone(&self.serialization),
            tx,
            Arc::clone(&self.metrics),
        );

        let writer = tokio::spawn(
            async move {
                while let Some(frame) = rx.recv().await {
                    if frame == Frame::Close {
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "Close after peer close");
                        }
                        break;
                    }
                    if let Err(e) = sink.send(frame).await {
                        warn!(error = %e, "Write failed, stopping writer");
                        break;
                    }
                }
            }
            .instrument(Span::current()),
        );

        self.metrics.connection_opened();
        info!(connection, "Socket opened");

        while let Some(next) = stream.next().await {
            let frame = match next {
                Ok(Frame::Close) => break,
                Ok(frame) => frame,
                Err(e) => {
                    warn!(connection, error = %e, "Transport error");
                    break;
                }
            };

            let flow = match self.state {
                SessionState::AwaitingHandshake => self.handshake(&frame, &outbound),
                SessionState::Active => self.receive(frame, &outbound),
                SessionState::Closed => Flow::Close,
            };
            if let Flow::Close = flow {
                break;
            }
        }

        self.state = SessionState::Closed;
        if outbound.send_frame(Frame::Close).is_err() {
            debug!(connection, "Writer already stopped");
        }
        drop(outbound);
        if let Err(e) = writer.await {
            error!(connection, error = %e, "Writer task failed");
        }

        self.metrics.connection_closed();
        info!(connection, "Socket closed");
        self.state
    }

    fn handshake(&mut self, frame: &Frame, outbound: &Outbound) -> Flow {
        match handshake::acknowledge(frame, outbound) {
            Ok(()) => {
                self.state = SessionState::Active;
                self.metrics.handshake_completed();
                Flow::Continue
            }
            Err(e) => {
                warn!(connection = self.connection_seq, error = %e, "Handshake failed");
                Flow::Close
            }
        }
    }

    fn receive(&mut self, frame: Frame, outbound: &Outbound) -> Flow {
        let connection = self.connection_seq;
        self.metrics.frame_received(frame.len() as u64);

        if frame.len() > MAX_FRAME_SIZE {
            self.metrics.decode_error();
            error!(connection, size = frame.len(), "Frame too large, closing");
            return Flow::Close;
        }

        let message = match self.serialization.decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.decode_error();
                debug!(connection, frame = %frame.describe(), "recv");
                error!(connection, size = frame.len(), error = %e, "Invalid message encoding, closing");
                return Flow::Close;
            }
        };

        info!(
            connection,
            session = %Diagnostic(message.session()),
            seq = ?message.seq(),
            message_type = message.message_type(),
            "recv"
        );
        debug!(connection, frame = %frame.describe(), "recv frame");

        match message {
            Message::CommandRequest(_) => {
                self.metrics.request_dispatched();
                let dispatcher = self.dispatcher.clone();
                let outbound = outbound.clone();
                tokio::spawn(
                    async move { dispatcher.dispatch(message, outbound).await }
                        .instrument(Span::current()),
                );
            }
            other => debug!(
                connection,
                message_type = other.message_type(),
                "Ignoring unsupported message type"
            ),
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::core::serialization::SerializationFormat;
    use crate::protocol::registry::ServiceRegistry;
    use crate::protocol::service::ServiceDescriptor;
    use crate::core::value;
    use crate::error::ProtocolError;
    use crate::transport::memory::{self, MemoryPeer};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn_session(format: SerializationFormat) -> (MemoryPeer, JoinHandle<SessionState>) {
        let mut registry = ServiceRegistry::new();
        registry
            .register(
                "echo.1",
                ServiceDescriptor::new()
                    .command("success", |ctx| async move {
                        Ok(Some(value::map([("echo", ctx.request().clone())])))
                    }),
            )
            .unwrap();

        let session = ConnectionSession::new(
            0,
            Dispatcher::new(Arc::new(registry)),
            Arc::new(MessageSerialization::new(format)),
            Arc::new(Metrics::new()),
        );
        assert_eq!(session.state(), SessionState::AwaitingHandshake);

        let (transport, peer) = memory::pair();
        (peer, tokio::spawn(session.run(transport)))
    }

    #[tokio::test]
    async fn first_frame_is_not_parsed_and_gets_ack() {
        let (mut peer, _session) = spawn_session(SerializationFormat::Json);

        peer.send_text(r#"{"type":"command.request","namespace":"echo.1","command":"success","seq":1}"#)
            .unwrap();
        assert_eq!(
            peer.recv_timeout(WAIT).await.unwrap(),
            Frame::Text("OP0200".into())
        );
        assert!(peer.recv_timeout(Duration::from_millis(100)).await.is_err());
    }

    #[tokio::test]
    async fn request_after_handshake_is_dispatched() {
        let (mut peer, _session) = spawn_session(SerializationFormat::Json);
        peer.send_text("hi").unwrap();
        peer.recv_timeout(WAIT).await.unwrap();

        peer.send_text(
            r#"{"type":"command.request","session":"s1","seq":1,"namespace":"echo.1","command":"success","payload":{"a":1}}"#,
        )
        .unwrap();
        let frame = peer.recv_timeout(WAIT).await.unwrap();
        let doc: Value = serde_json::from_slice(frame.as_bytes()).unwrap();
        assert_eq!(doc["payload"], json!({"echo": {"a": 1}}));
    }

    #[tokio::test]
    async fn decode_error_closes_without_response() {
        let (mut peer, session) = spawn_session(SerializationFormat::Json);
        peer.send_text("hi").unwrap();
        peer.recv_timeout(WAIT).await.unwrap();

        peer.send_text("{{{ definitely not json").unwrap();
        assert!(peer.recv().await.is_none());
        assert_eq!(session.await.unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn transport_error_closes_session() {
        let (mut peer, session) = spawn_session(SerializationFormat::Json);
        peer.send_text("hi").unwrap();
        peer.recv_timeout(WAIT).await.unwrap();

        peer.send_error(ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )))
        .unwrap();
        assert!(peer.recv().await.is_none());
        assert_eq!(session.await.unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn unknown_message_types_are_ignored() {
        let (mut peer, _session) = spawn_session(SerializationFormat::Json);
        peer.send_text("hi").unwrap();
        peer.recv_timeout(WAIT).await.unwrap();

        peer.send_text(r#"{"type":"event.publish","session":"s1","seq":1}"#)
            .unwrap();
        assert!(peer.recv_timeout(Duration::from_millis(100)).await.is_err());

        peer.send_text(
            r#"{"type":"command.request","session":"s1","seq":2,"namespace":"echo.1","command":"success"}"#,
        )
        .unwrap();
        assert!(peer.recv_timeout(WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn peer_close_ends_the_session() {
        let (mut peer, session) = spawn_session(SerializationFormat::Cbor);
        peer.send_text("hi").unwrap();
        peer.recv_timeout(WAIT).await.unwrap();

        peer.close();
        let state = tokio::time::timeout(WAIT, session)
            .await
            .expect("session should end")
            .unwrap();
        assert_eq!(state, SessionState::Closed);
    }
}
