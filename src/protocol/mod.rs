//! # Protocol Layer
//!
//! Everything between a decoded frame and a command handler.
//!
//! ## Components
//! - **Message**: request/response data model
//! - **Handshake**: `OP0200` acknowledgement of the first frame
//! - **Session**: per-connection state machine and read loop
//! - **Dispatcher**: routing, handler invocation and response selection
//! - **Service/Registry**: descriptors and the namespace table
//! - **Failure**: expected failures vs. unexpected errors
//!
//! ## Message Flow
//! ```text
//! Frame -> Unmarshaller -> Message -> Dispatcher -> handler
//!                                         |
//! Frame <- Marshaller <- CommandResponse <-+
//! ```

pub mod context;
pub mod dispatcher;
pub mod failure;
pub mod handshake;
pub mod message;
pub mod outbound;
pub mod registry;
pub mod service;
pub mod session;
