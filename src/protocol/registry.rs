//! Service registry: namespace to service descriptor.
//!
//! Built once before the server starts and shared read-only afterwards;
//! there is no way to register a service on a running server.

use crate::error::{ProtocolError, Result, RoutingError};
use crate::protocol::service::{CommandHandler, ServiceDescriptor};
use futures::future::try_join_all;
use std::collections::HashMap;
use tracing::info;

/// Fixed mapping from namespace to service.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under `namespace`.
    ///
    /// # Errors
    /// `ConfigError` if the namespace is already taken.
    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        descriptor: ServiceDescriptor,
    ) -> Result<&mut Self> {
        let namespace = namespace.into();
        if self.services.contains_key(&namespace) {
            return Err(ProtocolError::ConfigError(format!(
                "Namespace '{namespace}' is already registered"
            )));
        }
        self.services.insert(namespace, descriptor);
        Ok(self)
    }

    pub fn resolve(&self, namespace: &str) -> Option<&ServiceDescriptor> {
        self.services.get(namespace)
    }

    /// Resolve a command handler, telling an unknown namespace apart from an
    /// unknown command.
    pub fn resolve_command(
        &self,
        namespace: &str,
        command: &str,
    ) -> std::result::Result<&CommandHandler, RoutingError> {
        let service = self
            .resolve(namespace)
            .ok_or_else(|| RoutingError::UnknownNamespace {
                namespace: namespace.to_string(),
            })?;

        service
            .handler(command)
            .ok_or_else(|| RoutingError::UnknownCommand {
                namespace: namespace.to_string(),
                command: command.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Run every readiness operation concurrently and wait for all of them.
    ///
    /// # Errors
    /// `ServiceStart` for the first service that fails to start.
    pub async fn start_all(&self) -> Result<()> {
        let starts = self.services.iter().map(|(namespace, service)| async move {
            info!(namespace = %namespace, "Waiting for service to start");
            service
                .start()
                .await
                .map_err(|e| ProtocolError::ServiceStart {
                    namespace: namespace.clone(),
                    reason: e.to_string(),
                })?;
            info!(namespace = %namespace, "Service started");
            Ok::<_, ProtocolError>(())
        });

        try_join_all(starts).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::time::{Duration, Instant};

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry
            .register(
                "echo.1",
                ServiceDescriptor::new().command("echo", |_ctx| async { Ok(None) }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn resolve_distinguishes_namespace_from_command() {
        let registry = registry();
        assert!(registry.resolve_command("echo.1", "echo").is_ok());

        assert_eq!(
            registry.resolve_command("nope.1", "echo").err(),
            Some(RoutingError::UnknownNamespace {
                namespace: "nope.1".into()
            })
        );
        assert_eq!(
            registry.resolve_command("echo.1", "nope").err(),
            Some(RoutingError::UnknownCommand {
                namespace: "echo.1".into(),
                command: "nope".into()
            })
        );
    }

    #[test]
    fn duplicate_namespace_is_rejected() {
        let mut registry = registry();
        let result = registry.register("echo.1", ServiceDescriptor::new());
        assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn start_all_runs_services_concurrently() {
        let mut registry = ServiceRegistry::new();
        for namespace in ["a.1", "b.1", "c.1"] {
            registry
                .register(
                    namespace,
                    ServiceDescriptor::new().on_start(|| async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let started = Instant::now();
        registry.start_all().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn start_all_fails_when_any_service_fails() {
        let mut registry = registry();
        registry
            .register(
                "broken.1",
                ServiceDescriptor::new().on_start(|| async { Err("unreachable backend".into()) }),
            )
            .unwrap();

        let err = registry.start_all().await.unwrap_err();
        match err {
            ProtocolError::ServiceStart { namespace, reason } => {
                assert_eq!(namespace, "broken.1");
                assert_eq!(reason, "unreachable backend");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
