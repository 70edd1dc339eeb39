//! Observability and Metrics
//!
//! Counters for connection lifecycle, frames and command outcomes.
//!
//! Uses atomic counters for thread-safe metrics collection; every connection
//! and dispatch task updates the same [`Metrics`] through an `Arc`.

use crate::protocol::message::ResponseType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for engine operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Handshakes completed
    pub handshakes_completed: AtomicU64,
    /// Frames received after the handshake
    pub frames_received: AtomicU64,
    /// Bytes received after the handshake
    pub bytes_received: AtomicU64,
    /// Frames handed to transports
    pub frames_sent: AtomicU64,
    /// Bytes handed to transports
    pub bytes_sent: AtomicU64,
    /// Frames that could not be unmarshalled
    pub decode_errors: AtomicU64,
    /// Requests handed to the dispatcher
    pub requests_dispatched: AtomicU64,
    /// Success responses transmitted
    pub responses_success: AtomicU64,
    /// Failure responses transmitted
    pub responses_failure: AtomicU64,
    /// Error responses transmitted
    pub responses_error: AtomicU64,
    /// Responses dropped because the connection had closed
    pub responses_dropped: AtomicU64,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_completed: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            requests_dispatched: AtomicU64::new(0),
            responses_success: AtomicU64::new(0),
            responses_failure: AtomicU64::new(0),
            responses_error: AtomicU64::new(0),
            responses_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transmitted response of the given kind
    pub fn response_sent(&self, response_type: ResponseType) {
        let counter = match response_type {
            ResponseType::Success => &self.responses_success,
            ResponseType::Failure => &self.responses_failure,
            ResponseType::Error => &self.responses_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_dropped(&self) {
        self.responses_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            responses_success: self.responses_success.load(Ordering::Relaxed),
            responses_failure: self.responses_failure.load(Ordering::Relaxed),
            responses_error: self.responses_error.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            handshakes_completed = snapshot.handshakes_completed,
            frames_received = snapshot.frames_received,
            frames_sent = snapshot.frames_sent,
            decode_errors = snapshot.decode_errors,
            requests_dispatched = snapshot.requests_dispatched,
            responses_success = snapshot.responses_success,
            responses_failure = snapshot.responses_failure,
            responses_error = snapshot.responses_error,
            responses_dropped = snapshot.responses_dropped,
            uptime_seconds = snapshot.uptime_seconds,
            "Engine metrics"
        );
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_completed: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub decode_errors: u64,
    pub requests_dispatched: u64,
    pub responses_success: u64,
    pub responses_failure: u64,
    pub responses_error: u64,
    pub responses_dropped: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Responses of any kind that reached a transport
    pub fn responses_total(&self) -> u64 {
        self.responses_success + self.responses_failure + self.responses_error
    }
}
