//! # Services
//!
//! Concrete services that plug into the
//! [`ServiceRegistry`](crate::protocol::registry::ServiceRegistry).
//!
//! ## Components
//! - **Echo**: demo service under `echo.1`, also used by the integration tests

pub mod echo;

pub use echo::EchoService;
