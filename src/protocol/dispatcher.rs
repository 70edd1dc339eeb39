//! Command dispatch.
//!
//! Resolves `namespace`/`command` of a request to a handler, runs it behind
//! `catch_unwind` and maps the outcome to a response:
//!
//! | Outcome | Response |
//! |---|---|
//! | unknown namespace or command | `error` |
//! | `Ok(Some(value))` | `success` with `value`, unless the handler already responded |
//! | `Ok(None)` | none |
//! | `Err(Failure)` | `failure` with the user fields |
//! | any other error, panic | `error` |
//!
//! Only the first answer of a request is sent; see [`Responder`].

use crate::protocol::context::{CommandContext, Responder};
use crate::protocol::failure::CommandError;
use crate::protocol::message::Message;
use crate::protocol::outbound::Outbound;
use crate::protocol::registry::ServiceRegistry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// Routes command requests to handlers and turns their outcome into at most
/// one response.
///
/// Routing errors, failures, unexpected errors and panics are all contained
/// here: nothing a handler does can affect other requests or the connection.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, message: Message, outbound: Outbound) {
        let request = match message {
            Message::CommandRequest(request) => request,
            other => {
                debug!(
                    connection = outbound.connection_seq(),
                    message_type = other.message_type(),
                    "Ignoring non-request message"
                );
                return;
            }
        };

        let responder = Responder::new(request.correlation(), outbound);
        let handler = match self
            .registry
            .resolve_command(&request.namespace, &request.command)
        {
            Ok(handler) => Arc::clone(handler),
            Err(routing) => {
                responder.error(&routing);
                return;
            }
        };

        let ctx = CommandContext::new(responder.clone(), request.payload);
        let outcome = AssertUnwindSafe(handler(ctx)).catch_unwind().await;

        match outcome {
            Ok(Ok(Some(value))) => {
                if !responder.has_responded() {
                    responder.respond(value);
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(CommandError::Failure(failure))) => responder.fail(&failure),
            Ok(Err(CommandError::Unexpected(error))) => responder.error(&error),
            Err(_) => responder.error(&format_args!(
                "Command '{}' in namespace '{}' panicked",
                request.command, request.namespace
            )),
        }
    }
}
