//! # Utility Modules
//!
//! Supporting utilities shared by the engine and the binary.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` installation from [`crate::config::LoggingConfig`]
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
