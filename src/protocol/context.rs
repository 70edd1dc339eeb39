//! Request context handed to command handlers.
//!
//! A handler receives a [`CommandContext`] holding the request payload and a
//! [`Responder`], the `respond` capability bound to that one request:
//! - with a `seq`, `respond` marshals and transmits a `success` response
//! - without a `seq`, `respond` only logs that the result went unsent
//!
//! Handlers that produce their result early call `respond` themselves and may
//! return `Ok(None)`. Otherwise the dispatcher calls `respond` once with the
//! returned value.
//!
//! A request is answered at most once. Whichever of `respond`, a failure or
//! an error comes first is sent; later ones are only logged.
//!
//! # Example
//!
//! ```ignore
//! async fn echo(ctx: CommandContext) -> CommandResult {
//!     Ok(Some(value::map([("echo", ctx.request().clone())])))
//! }
//!
//! async fn progress(ctx: CommandContext) -> CommandResult {
//!     ctx.respond(value::map([("state", Value::Text("accepted".into()))]));
//!     do_the_work().await?;
//!     Ok(None)
//! }
//! ```

use crate::core::value::{Diagnostic, Value};
use crate::error::ProtocolError;
use crate::protocol::failure::Failure;
use crate::protocol::message::{CommandResponse, Correlation, Message};
use crate::protocol::outbound::Outbound;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The `respond` capability of one request.
///
/// `Responder` is `Clone` and can be moved into tasks spawned by a handler.
/// Responding after the connection has closed is logged and dropped.
#[derive(Debug, Clone)]
pub struct Responder {
    correlation: Arc<Correlation>,
    outbound: Outbound,
    responded: Arc<AtomicBool>,
}

impl Responder {
    pub fn new(correlation: Correlation, outbound: Outbound) -> Self {
        Self {
            correlation: Arc::new(correlation),
            outbound,
            responded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Whether the client asked for a response (the request carried a `seq`).
    pub fn is_response_required(&self) -> bool {
        self.correlation.seq.is_some()
    }

    /// Whether this request has been answered.
    pub fn has_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Claims the single answer of this request. False if already taken.
    fn claim(&self) -> bool {
        !self.responded.swap(true, Ordering::AcqRel)
    }

    /// Send a `success` response carrying `payload`.
    pub fn respond(&self, payload: Value) {
        let connection = self.outbound.connection_seq();
        let session = Diagnostic(&self.correlation.session);
        let payload_log = Diagnostic(&payload);

        if !self.claim() {
            warn!(
                connection,
                %session,
                seq = ?self.correlation.seq,
                payload = %payload_log,
                "Already responded, success not sent"
            );
            return;
        }

        match self.correlation.seq {
            None => info!(connection, %session, payload = %payload_log, "Success unsent (no seq)"),
            Some(seq) => {
                info!(connection, %session, seq, "Success");
                self.transmit(CommandResponse::success(&self.correlation, payload));
            }
        }
    }

    /// Send a `failure` response built from the failure's user fields and log
    /// its real fields.
    pub(crate) fn fail(&self, failure: &Failure) {
        let connection = self.outbound.connection_seq();
        let session = Diagnostic(&self.correlation.session);
        let real = failure.real();
        let real_data = Diagnostic(real.data.as_ref().unwrap_or(&Value::Null));

        if !self.claim() {
            warn!(
                connection,
                %session,
                seq = ?self.correlation.seq,
                kind = failure.kind(),
                real_message = %real.message,
                %real_data,
                "Already responded, failure not sent"
            );
            return;
        }

        match self.correlation.seq {
            None => info!(
                connection,
                %session,
                kind = failure.kind(),
                real_message = %real.message,
                %real_data,
                "Failure unsent (no seq)"
            ),
            Some(seq) => {
                info!(
                    connection,
                    %session,
                    seq,
                    kind = failure.kind(),
                    real_message = %real.message,
                    %real_data,
                    "Failure"
                );
                self.transmit(CommandResponse::failure(&self.correlation, failure.payload()));
            }
        }
    }

    /// Send a payload-free `error` response and log the diagnostic.
    pub(crate) fn error(&self, diagnostic: &dyn Display) {
        let connection = self.outbound.connection_seq();
        let session = Diagnostic(&self.correlation.session);

        if !self.claim() {
            error!(
                connection,
                %session,
                seq = ?self.correlation.seq,
                error = %diagnostic,
                "Already responded, error not sent"
            );
            return;
        }

        match self.correlation.seq {
            None => error!(connection, %session, error = %diagnostic, "Error unsent (no seq)"),
            Some(seq) => {
                error!(connection, %session, seq, error = %diagnostic, "Error");
                self.transmit(CommandResponse::error(&self.correlation));
            }
        }
    }

    fn transmit(&self, response: CommandResponse) {
        let response_type = response.response_type;
        match self.outbound.send(&Message::CommandResponse(response)) {
            Ok(()) => self.outbound.metrics().response_sent(response_type),
            Err(ProtocolError::ConnectionClosed) => {
                self.outbound.metrics().response_dropped();
                warn!(
                    connection = self.outbound.connection_seq(),
                    session = %Diagnostic(&self.correlation.session),
                    seq = ?self.correlation.seq,
                    response_type = response_type.as_str(),
                    "Connection closed, response dropped"
                );
            }
            Err(e) => {
                self.outbound.metrics().response_dropped();
                error!(
                    connection = self.outbound.connection_seq(),
                    session = %Diagnostic(&self.correlation.session),
                    seq = ?self.correlation.seq,
                    response_type = response_type.as_str(),
                    error = %e,
                    "Failed to marshal response"
                );
            }
        }
    }
}

/// What a command handler is invoked with.
#[derive(Debug)]
pub struct CommandContext {
    responder: Responder,
    request: Option<Value>,
}

impl CommandContext {
    pub fn new(responder: Responder, request: Option<Value>) -> Self {
        Self { responder, request }
    }

    /// Request payload, `null` when the client sent none.
    pub fn request(&self) -> &Value {
        self.request.as_ref().unwrap_or(&Value::Null)
    }

    pub fn is_response_required(&self) -> bool {
        self.responder.is_response_required()
    }

    /// See [`Responder::respond`].
    pub fn respond(&self, payload: Value) {
        self.responder.respond(payload);
    }

    /// A clone of the respond capability, for use from spawned tasks.
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }
}
