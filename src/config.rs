//! # Configuration Management
//!
//! Centralized configuration for the protocol server.
//!
//! ## Configuration Sources
//! - Environment variables via `from_env()` (`PORT` is mandatory)
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//!
//! ## Environment Variables
//! | Variable | Field |
//! |---|---|
//! | `PORT` | `server.port` (required) |
//! | `HOST` | `server.host` |
//! | `OVERPASS_MIME_TYPE` | `server.default_mime_type` |
//! | `OVERPASS_SHUTDOWN_TIMEOUT_MS` | `server.shutdown_timeout` |
//! | `OVERPASS_LOG_LEVEL` | `logging.log_level` |
//! | `OVERPASS_LOG_JSON` | `logging.json_format` |

use crate::core::serialization::{SerializationFormat, MIME_JSON};
use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Interface the server binds to unless told otherwise
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Largest inbound frame a session will try to decode
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// How long a shutdown waits for open connections to drain
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OverpassConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OverpassConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from the process environment
    ///
    /// # Errors
    /// `ConfigError` when `PORT` is unset or any variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let port = lookup("PORT")
            .ok_or_else(|| ProtocolError::ConfigError(constants::ERR_PORT_REQUIRED.into()))?;
        config.server.port = Some(parse_var("PORT", &port)?);

        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }

        if let Some(mime_type) = lookup("OVERPASS_MIME_TYPE") {
            config.server.default_mime_type = mime_type;
        }

        if let Some(timeout) = lookup("OVERPASS_SHUTDOWN_TIMEOUT_MS") {
            let millis: u64 = parse_var("OVERPASS_SHUTDOWN_TIMEOUT_MS", &timeout)?;
            config.server.shutdown_timeout = Duration::from_millis(millis);
        }

        if let Some(level) = lookup("OVERPASS_LOG_LEVEL") {
            config.logging.log_level = parse_var("OVERPASS_LOG_LEVEL", &level)?;
        }

        if let Some(json) = lookup("OVERPASS_LOG_JSON") {
            config.logging.json_format = parse_var("OVERPASS_LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid {name} '{value}': {e}")))
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind, any interface by default
    pub host: String,

    /// Port to listen on; there is no default
    pub port: Option<u16>,

    /// Mime type of the serialization every connection uses
    pub default_mime_type: String,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from(DEFAULT_HOST),
            port: None,
            default_mime_type: String::from(MIME_JSON),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Config listening on `port` with every other setting at its default
    pub fn with_port(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    /// Host and port to bind.
    ///
    /// # Errors
    /// `ConfigError` when no port is configured.
    pub fn bind_address(&self) -> Result<(String, u16)> {
        let port = self
            .port
            .ok_or_else(|| ProtocolError::ConfigError(constants::ERR_PORT_REQUIRED.into()))?;
        Ok((self.host.clone(), port))
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port.is_none() {
            errors.push(constants::ERR_PORT_REQUIRED.to_string());
        }

        if self.host.trim().is_empty() {
            errors.push("Server host cannot be empty".to_string());
        }

        if SerializationFormat::from_mime_type(&self.default_mime_type).is_none() {
            errors.push(format!(
                "Unsupported serialization mime type: '{}'",
                self.default_mime_type
            ));
        }

        if self.shutdown_timeout.as_millis() < 100 {
            errors.push("Shutdown timeout too short (minimum: 100ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("overpass-server"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn env_requires_port() {
        let result = OverpassConfig::from_lookup(lookup(&[("HOST", "127.0.0.1")]));
        match result {
            Err(ProtocolError::ConfigError(msg)) => assert!(msg.contains("PORT")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn env_overrides_defaults() {
        let config = OverpassConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("OVERPASS_MIME_TYPE", "application/cbor"),
            ("OVERPASS_SHUTDOWN_TIMEOUT_MS", "2500"),
            ("OVERPASS_LOG_LEVEL", "debug"),
            ("OVERPASS_LOG_JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, Some(8080));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.default_mime_type, "application/cbor");
        assert_eq!(config.server.shutdown_timeout, Duration::from_millis(2500));
        assert_eq!(config.logging.log_level, Level::DEBUG);
        assert!(config.logging.json_format);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn env_rejects_garbage_port() {
        let result = OverpassConfig::from_lookup(lookup(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
    }

    #[test]
    fn bind_address_uses_default_host() {
        let config = ServerConfig::with_port(9000);
        assert_eq!(
            config.bind_address().unwrap(),
            (String::from("0.0.0.0"), 9000)
        );
        assert!(ServerConfig::default().bind_address().is_err());
    }
}
