//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Text and binary messages map one-to-one onto [`Frame`]s. Ping/pong control
//! messages are answered by tungstenite itself and never reach the engine.

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use bytes::Bytes;
use futures::{ready, Sink, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::instrument;

/// A WebSocket connection seen as a stream and sink of frames.
#[derive(Debug)]
pub struct WebSocketTransport<S> {
    inner: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S> {
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self { inner }
    }
}

/// Complete the server side of the WebSocket upgrade on an accepted socket.
#[instrument(skip(stream), level = "debug")]
pub async fn accept(stream: TcpStream) -> Result<WebSocketTransport<TcpStream>> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    Ok(WebSocketTransport::new(ws))
}

/// Open a client connection, e.g. `ws://127.0.0.1:8080`.
#[instrument(level = "debug")]
pub async fn connect(url: &str) -> Result<WebSocketTransport<MaybeTlsStream<TcpStream>>> {
    let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
    Ok(WebSocketTransport::new(ws))
}

impl<S> Stream for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let frame = match ready!(self.inner.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(e)) => return Poll::Ready(Some(Err(ProtocolError::from(e)))),
                Some(Ok(WsMessage::Text(text))) => Frame::Text(text),
                Some(Ok(WsMessage::Binary(data))) => Frame::Binary(Bytes::from(data)),
                Some(Ok(WsMessage::Close(_))) => Frame::Close,
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                    continue
                }
            };
            return Poll::Ready(Some(Ok(frame)));
        }
    }
}

impl<S> Sink<Frame> for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Error = ProtocolError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_ready(cx)
            .map_err(ProtocolError::from)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => WsMessage::Text(text),
            Frame::Binary(data) => WsMessage::Binary(data.to_vec()),
            Frame::Close => WsMessage::Close(None),
        };
        Pin::new(&mut self.inner)
            .start_send(message)
            .map_err(ProtocolError::from)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_flush(cx)
            .map_err(ProtocolError::from)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_close(cx)
            .map_err(ProtocolError::from)
    }
}
