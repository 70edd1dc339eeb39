//! Outcomes a command handler can raise.
//!
//! [`CommandError`] is closed: a handler either raises an expected
//! [`Failure`], whose `user` half is reported to the client, or anything else,
//! which is reported as a content-free `error` response and only logged.

use crate::core::value::{self, Value};
use thiserror::Error;

/// Boxed error type for unexpected handler errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A message with optional structured data.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub message: String,
    pub data: Option<Value>,
}

impl Detail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// An expected, application-raised outcome.
///
/// `user` is safe to transmit. `real` is diagnostic and is only ever logged.
///
/// ```
/// use overpass_server::core::value::{self, Diagnostic, Value};
/// use overpass_server::protocol::failure::Failure;
/// use serde_json::json;
///
/// let failure = Failure::new("quota-exceeded", "Too many requests.")
///     .with_user_data(value::from_json(json!({"retryAfter": 30})))
///     .with_real("bucket 7 exhausted", Some(value::from_json(json!({"bucket": 7}))));
///
/// let payload = failure.payload();
/// assert_eq!(
///     value::get(&payload, "message"),
///     Some(&Value::Text("Too many requests.".into()))
/// );
/// assert!(!Diagnostic(&payload).to_string().contains("bucket"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{kind}] {}", .real.message)]
pub struct Failure {
    kind: String,
    user: Detail,
    real: Detail,
}

impl Failure {
    /// New failure whose diagnostic message defaults to the user message.
    pub fn new(kind: impl Into<String>, user_message: impl Into<String>) -> Self {
        let user = Detail::new(user_message);
        Self {
            kind: kind.into(),
            real: user.clone(),
            user,
        }
    }

    pub fn with_user_data(mut self, data: Value) -> Self {
        self.user.data = Some(data);
        self
    }

    pub fn with_real(mut self, message: impl Into<String>, data: Option<Value>) -> Self {
        self.real = Detail {
            message: message.into(),
            data,
        };
        self
    }

    /// Machine-readable category clients can branch on.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn user(&self) -> &Detail {
        &self.user
    }

    pub fn real(&self) -> &Detail {
        &self.real
    }

    /// Payload of the `failure` response. Built from `user` only.
    pub fn payload(&self) -> Value {
        value::map([
            ("type", Value::Text(self.kind.clone())),
            ("message", Value::Text(self.user.message.clone())),
            ("data", self.user.data.clone().unwrap_or(Value::Null)),
        ])
    }
}

/// Error raised by a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Failure(#[from] Failure),

    #[error("{0}")]
    Unexpected(#[from] BoxError),
}

impl CommandError {
    /// Wrap any error as unexpected.
    pub fn unexpected(error: impl Into<BoxError>) -> Self {
        CommandError::Unexpected(error.into())
    }
}
