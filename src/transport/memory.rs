//! In-process transport made of two channels.
//!
//! [`pair`] returns the engine-facing [`MemoryTransport`] and the
//! client-facing [`MemoryPeer`]. Dropping the peer (or calling
//! [`MemoryPeer::close`]) looks like a remote close to the engine; closing the
//! transport ends the peer's receive stream.

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{Sink, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Engine side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: UnboundedReceiver<Result<Frame>>,
    outbound: UnboundedSender<Frame>,
}

/// Client side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    tx: Option<UnboundedSender<Result<Frame>>>,
    rx: UnboundedReceiver<Frame>,
}

/// Create a connected transport/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (client_tx, server_rx) = unbounded();
    let (server_tx, client_rx) = unbounded();
    (
        MemoryTransport {
            inbound: server_rx,
            outbound: server_tx,
        },
        MemoryPeer {
            tx: Some(client_tx),
            rx: client_rx,
        },
    )
}

impl MemoryPeer {
    /// Deliver a frame to the engine.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?
            .unbounded_send(Ok(frame))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Frame::Text(text.into()))
    }

    /// Deliver a transport-level error to the engine.
    pub fn send_error(&self, error: ProtocolError) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?
            .unbounded_send(Err(error))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Close the client side. The engine sees the end of its inbound stream.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Next frame written by the engine, `None` once the engine closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.next().await
    }

    /// Like [`MemoryPeer::recv`] but gives up after `timeout`.
    ///
    /// # Errors
    /// `ConnectionClosed` when the engine closed the transport, a `Timeout`
    /// flavoured `Io` error when nothing arrived in time.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Frame> {
        match tokio::time::timeout(timeout, self.rx.next()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(ProtocolError::ConnectionClosed),
            Err(elapsed) => Err(ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                elapsed,
            ))),
        }
    }
}

impl Stream for MemoryTransport {
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_next_unpin(cx)
    }
}

impl Sink<Frame> for MemoryTransport {
    type Error = ProtocolError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.outbound)
            .poll_ready(cx)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<()> {
        Pin::new(&mut self.outbound)
            .start_send(frame)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.outbound)
            .poll_flush(cx)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn poll_close(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.outbound.close_channel();
        Poll::Ready(Ok(()))
    }
}
