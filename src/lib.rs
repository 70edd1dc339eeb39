//! # Overpass Server
//!
//! Session-oriented request/response protocol engine over WebSocket
//! connections.
//!
//! A client opens a connection, sends any first frame and receives the
//! literal `OP0200`. After that every frame is a protocol message: a
//! `command.request` names a namespace and a command, the server routes it to
//! the registered service, and if the request carried a `seq` exactly one
//! `command.response` (`success`, `failure` or `error`) comes back.
//!
//! ## Layout
//! - [`core`]: frames, JSON/CBOR codecs, payload values, message marshalling
//! - [`protocol`]: handshake, sessions, dispatch, services, failures
//! - [`transport`]: WebSocket and in-memory transports
//! - [`server`]: service startup, listener and accept loop
//! - [`service`]: the `echo.1` demo service
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ## Example
//! ```no_run
//! use overpass_server::config::ServerConfig;
//! use overpass_server::protocol::registry::ServiceRegistry;
//! use overpass_server::server::Server;
//! use overpass_server::service::EchoService;
//!
//! # async fn run() -> overpass_server::error::Result<()> {
//! let mut services = ServiceRegistry::new();
//! EchoService::new().register(&mut services)?;
//!
//! Server::new(ServerConfig::with_port(8080), services)?.start().await
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use server::Server;
