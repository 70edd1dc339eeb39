//! Demo service registered under `echo.1`.
//!
//! | Command | Behaviour |
//! |---|---|
//! | `echo` | waits `echo_delay`, returns `{"echo": request}` |
//! | `success` | returns `{"echo": request}` at once |
//! | `fail` | raises the `echo-failure` [`Failure`] |
//! | `error` | raises an unexpected error |
//! | `respond` | responds from a spawned task and returns nothing |

use crate::core::value::{self, Value};
use crate::error::Result;
use crate::protocol::context::CommandContext;
use crate::protocol::failure::{CommandError, Failure};
use crate::protocol::registry::ServiceRegistry;
use crate::protocol::service::{CommandResult, ServiceDescriptor};
use std::time::Duration;
use tracing::info;

/// Namespace the echo service is registered under.
pub const NAMESPACE: &str = "echo.1";

/// Failure type raised by the `fail` command.
pub const FAILURE_KIND: &str = "echo-failure";

/// Echo service with a slow start and a slow `echo` command.
#[derive(Debug, Clone, Copy)]
pub struct EchoService {
    start_delay: Duration,
    echo_delay: Duration,
}

impl Default for EchoService {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(3),
            echo_delay: Duration::from_secs(3),
        }
    }
}

impl EchoService {
    pub fn new() -> Self {
        Self::default()
    }

    /// No start delay and no echo delay.
    pub fn instant() -> Self {
        Self::with_delays(Duration::ZERO, Duration::ZERO)
    }

    pub fn with_delays(start_delay: Duration, echo_delay: Duration) -> Self {
        Self {
            start_delay,
            echo_delay,
        }
    }

    /// Command table and readiness operation.
    pub fn descriptor(self) -> ServiceDescriptor {
        ServiceDescriptor::new()
            .on_start(move || async move {
                info!(namespace = NAMESPACE, "Service starting");
                tokio::time::sleep(self.start_delay).await;
                info!(namespace = NAMESPACE, "Service started");
                Ok(())
            })
            .command("echo", move |ctx| self.echo(ctx))
            .command("success", |ctx| async move { success(ctx) })
            .command("fail", |ctx| async move { fail(ctx) })
            .command("error", |_ctx| async {
                Err(CommandError::unexpected("Echo error requested by client"))
            })
            .command("respond", |ctx| async move { respond(ctx) })
    }

    /// Register under [`NAMESPACE`].
    pub fn register(self, registry: &mut ServiceRegistry) -> Result<()> {
        registry.register(NAMESPACE, self.descriptor())?;
        Ok(())
    }

    async fn echo(self, ctx: CommandContext) -> CommandResult {
        info!(namespace = NAMESPACE, "Pausing for dramatic effect");
        tokio::time::sleep(self.echo_delay).await;
        Ok(Some(echo_of(&ctx)))
    }
}

fn echo_of(ctx: &CommandContext) -> Value {
    value::map([("echo", ctx.request().clone())])
}

fn success(ctx: CommandContext) -> CommandResult {
    Ok(Some(echo_of(&ctx)))
}

fn fail(ctx: CommandContext) -> CommandResult {
    let failure = Failure::new(FAILURE_KIND, "You done goofed.")
        .with_user_data(value::map([("request", ctx.request().clone())]))
        .with_real(
            "Echo failure requested by client",
            Some(value::map([("internal", Value::Bool(true))])),
        );
    Err(failure.into())
}

fn respond(ctx: CommandContext) -> CommandResult {
    let responder = ctx.responder();
    let payload = echo_of(&ctx);
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        responder.respond(payload);
    });
    Ok(None)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::core::registry::MessageSerialization;
    use crate::core::serialization::SerializationFormat;
    use crate::protocol::dispatcher::Dispatcher;
    use crate::protocol::message::{CommandRequest, Message};
    use crate::protocol::outbound::Outbound;
    use crate::utils::Metrics;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn registers_every_command() {
        let mut registry = ServiceRegistry::new();
        EchoService::instant().register(&mut registry).unwrap();

        let descriptor = registry.resolve(NAMESPACE).unwrap();
        let mut commands: Vec<&str> = descriptor.command_names().collect();
        commands.sort_unstable();
        assert_eq!(commands, ["echo", "error", "fail", "respond", "success"]);
    }

    #[test]
    fn registering_twice_is_rejected() {
        let mut registry = ServiceRegistry::new();
        EchoService::instant().register(&mut registry).unwrap();
        assert!(EchoService::instant().register(&mut registry).is_err());
    }

    #[tokio::test]
    async fn success_echoes_binary_requests_over_cbor() {
        let mut registry = ServiceRegistry::new();
        EchoService::instant().register(&mut registry).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cbor = Arc::new(MessageSerialization::new(SerializationFormat::Cbor));
        let outbound = Outbound::new(0, Arc::clone(&cbor), tx, Arc::new(Metrics::new()));
        let request = CommandRequest {
            session: Value::Bytes(vec![7]),
            seq: Some(1),
            namespace: NAMESPACE.into(),
            command: "success".into(),
            payload: Some(Value::Bytes(vec![0xca, 0xfe])),
        };
        Dispatcher::new(Arc::new(registry))
            .dispatch(request.into(), outbound)
            .await;

        match cbor.decode(&rx.try_recv().unwrap()).unwrap() {
            Message::CommandResponse(response) => {
                assert_eq!(response.session, Value::Bytes(vec![7]));
                assert_eq!(
                    response.payload,
                    Some(value::map([("echo", Value::Bytes(vec![0xca, 0xfe]))]))
                );
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_waits_for_the_start_delay() {
        let service = EchoService::with_delays(Duration::from_millis(50), Duration::ZERO);
        let started = tokio::time::Instant::now();
        service.descriptor().start().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
