//! # Server
//!
//! Starts every registered service, binds a TCP listener and runs one
//! [`ConnectionSession`] per accepted WebSocket connection.
//!
//! ```no_run
//! use overpass_server::config::ServerConfig;
//! use overpass_server::protocol::registry::ServiceRegistry;
//! use overpass_server::server::Server;
//!
//! # async fn run() -> overpass_server::error::Result<()> {
//! let server = Server::new(ServerConfig::with_port(8080), ServiceRegistry::new())?;
//! server.start().await
//! # }
//! ```

use crate::config::ServerConfig;
use crate::core::registry::{MessageSerialization, SerializationRegistry};
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::registry::ServiceRegistry;
use crate::protocol::session::ConnectionSession;
use crate::transport::memory::{self, MemoryPeer};
use crate::transport::websocket;
use crate::utils::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn, Instrument};

/// How often shutdown re-checks the number of open connections
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The protocol server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
    serializations: SerializationRegistry,
    serialization: Arc<MessageSerialization>,
    connection_seq: AtomicU64,
    metrics: Arc<Metrics>,
}

impl Server {
    /// Build a server around a fixed set of services.
    ///
    /// # Errors
    /// `UnknownSerialization` when the configured mime type is not registered.
    pub fn new(config: ServerConfig, services: ServiceRegistry) -> Result<Self> {
        let serializations = SerializationRegistry::new().with_default(&config.default_mime_type)?;
        let serialization = Arc::new(serializations.default_serialization()?.clone());

        Ok(Self {
            config,
            dispatcher: Dispatcher::new(Arc::new(services)),
            serializations,
            serialization,
            connection_seq: AtomicU64::new(0),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn serializations(&self) -> &SerializationRegistry {
        &self.serializations
    }

    /// Mime type every connection speaks.
    pub fn mime_type(&self) -> &str {
        self.serialization.mime_type()
    }

    /// Allocate the next connection number. Starts at 0.
    fn next_connection_seq(&self) -> u64 {
        self.connection_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// A fresh session for a connection that was just accepted.
    pub fn open_session(&self) -> ConnectionSession {
        ConnectionSession::new(
            self.next_connection_seq(),
            self.dispatcher.clone(),
            Arc::clone(&self.serialization),
            Arc::clone(&self.metrics),
        )
    }

    /// Serve an in-process client over a memory transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_local(&self) -> MemoryPeer {
        let (transport, peer) = memory::pair();
        let session = self.open_session();
        tokio::spawn(async move {
            session.run(transport).await;
        });
        peer
    }

    /// Wait for every service to become ready, then bind the listener.
    ///
    /// # Errors
    /// `ServiceStart` if any readiness operation fails, `ConfigError` without
    /// a port, `Io` if the address cannot be bound.
    #[instrument(skip(self), fields(host = %self.config.host, port = ?self.config.port))]
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = self.config.bind_address()?;
        self.dispatcher.registry().start_all().await?;

        let listener = TcpListener::bind((address.0.as_str(), address.1)).await?;
        info!(
            address = %listener.local_addr()?,
            mime_type = self.mime_type(),
            "Listening"
        );
        Ok(listener)
    }

    /// Start the server and run until Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.start_with_shutdown(shutdown_rx).await
    }

    /// Start the server and run until `shutdown_rx` fires or closes.
    pub async fn start_with_shutdown(self, shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Accept connections on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    self.drain().await;
                    self.metrics.log_metrics();
                    return Ok(());
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.accept(stream, peer),
                        Err(e) => error!(error = %e, "Error accepting connection"),
                    }
                }
            }
        }
    }

    fn accept(&self, stream: TcpStream, peer: std::net::SocketAddr) {
        let session = self.open_session();
        let span = tracing::info_span!("accept", connection = session.connection_seq(), %peer);

        tokio::spawn(
            async move {
                match websocket::accept(stream).await {
                    Ok(transport) => {
                        session.run(transport).await;
                    }
                    Err(e) => warn!(error = %e, "WebSocket upgrade failed"),
                }
            }
            .instrument(span),
        );
    }

    async fn drain(&self) {
        let timeout = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let connections = self.metrics.snapshot().connections_active;
            if connections == 0 {
                info!("All connections closed, shutting down");
                return;
            }

            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {
                    info!(connections, "Waiting for connections to close");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::frame::Frame;
    use crate::core::serialization::MIME_CBOR;
    use crate::error::ProtocolError;
    use crate::protocol::service::ServiceDescriptor;

    #[test]
    fn unknown_default_mime_type_is_rejected() {
        let mut config = ServerConfig::with_port(0);
        config.default_mime_type = "application/xml".into();
        assert!(matches!(
            Server::new(config, ServiceRegistry::new()),
            Err(ProtocolError::UnknownSerialization(_))
        ));
    }

    #[test]
    fn configured_mime_type_is_used() {
        let mut config = ServerConfig::with_port(0);
        config.default_mime_type = MIME_CBOR.into();
        let server = Server::new(config, ServiceRegistry::new()).unwrap();
        assert_eq!(server.mime_type(), MIME_CBOR);
    }

    #[test]
    fn connection_seq_starts_at_zero_and_increases() {
        let server = Server::new(ServerConfig::with_port(0), ServiceRegistry::new()).unwrap();
        let seqs: Vec<u64> = (0..3).map(|_| server.open_session().connection_seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn failed_service_start_prevents_bind() {
        let mut services = ServiceRegistry::new();
        services
            .register(
                "broken.1",
                ServiceDescriptor::new().on_start(|| async { Err("no database".into()) }),
            )
            .unwrap();
        let server = Server::new(ServerConfig::with_port(0), services).unwrap();

        match server.bind().await {
            Err(ProtocolError::ServiceStart { namespace, .. }) => assert_eq!(namespace, "broken.1"),
            other => panic!("expected service start failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_connections_handshake() {
        let server = Server::new(ServerConfig::with_port(0), ServiceRegistry::new()).unwrap();
        let mut peer = server.connect_local();
        peer.send_text("hello").unwrap();
        assert_eq!(
            peer.recv_timeout(Duration::from_secs(2)).await.unwrap(),
            Frame::Text("OP0200".into())
        );
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let mut config = ServerConfig::with_port(0);
        config.host = "127.0.0.1".into();
        let server = Server::new(config, ServiceRegistry::new()).unwrap();
        let listener = server.bind().await.unwrap();

        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(server.serve(listener, rx));
        tx.send(()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
