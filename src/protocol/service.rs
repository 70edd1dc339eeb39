//! Service descriptors: a readiness operation plus a command table.
//!
//! # Example
//!
//! ```
//! use overpass_server::protocol::failure::Failure;
//! use overpass_server::core::value::Value;
//! use overpass_server::protocol::service::ServiceDescriptor;
//!
//! let descriptor = ServiceDescriptor::new()
//!     .on_start(|| async { Ok(()) })
//!     .command("ping", |_ctx| async { Ok(Some(Value::Text("pong".into()))) })
//!     .command("deny", |_ctx| async {
//!         Err(Failure::new("denied", "Not today.").into())
//!     });
//!
//! assert!(descriptor.handler("ping").is_some());
//! assert!(descriptor.handler("pong").is_none());
//! ```

use crate::core::value::Value;
use crate::protocol::context::CommandContext;
use crate::protocol::failure::{BoxError, CommandError};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a command: `Some` value to respond with, `None` for nothing.
pub type CommandResult = std::result::Result<Option<Value>, CommandError>;

/// Boxed future returned by command handlers.
pub type CommandFuture = BoxFuture<'static, CommandResult>;

/// A registered command handler.
pub type CommandHandler = Arc<dyn Fn(CommandContext) -> CommandFuture + Send + Sync>;

/// Boxed future returned by readiness operations.
pub type StartFuture = BoxFuture<'static, std::result::Result<(), BoxError>>;

type StartFn = Box<dyn Fn() -> StartFuture + Send + Sync>;

/// Everything the engine knows about one service.
#[derive(Default)]
pub struct ServiceDescriptor {
    start: Option<StartFn>,
    commands: HashMap<String, CommandHandler>,
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.commands.keys().collect();
        commands.sort();
        f.debug_struct("ServiceDescriptor")
            .field("has_start", &self.start.is_some())
            .field("commands", &commands)
            .finish()
    }
}

impl ServiceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the readiness operation awaited before the server accepts connections.
    pub fn on_start<F, Fut>(mut self, start: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), BoxError>> + Send + 'static,
    {
        self.start = Some(Box::new(move || -> StartFuture { Box::pin(start()) }));
        self
    }

    /// Add a command. A later registration under the same name replaces the
    /// earlier one.
    pub fn command<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        let boxed: CommandHandler =
            Arc::new(move |ctx: CommandContext| -> CommandFuture { Box::pin(handler(ctx)) });
        self.commands.insert(name.into(), boxed);
        self
    }

    /// Run the readiness operation. Services without one are ready at once.
    pub fn start(&self) -> StartFuture {
        match &self.start {
            Some(start) => start(),
            None => Box::pin(async { Ok(()) }),
        }
    }

    pub fn handler(&self, command: &str) -> Option<&CommandHandler> {
        self.commands.get(command)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}
