//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Values are taken literally; nothing in a config file is evaluated.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::auth::AuthPolicy;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, HTTP and HTTPS ports).
    pub listener: ListenerConfig,

    /// Deadline for the outbound dial or outbound request, in milliseconds.
    pub timeout_ms: u64,

    /// Client authentication policy.
    pub auth: AuthPolicy,

    /// Log sinks and level.
    pub logging: LoggingConfig,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeout_ms: 10_000,
            auth: AuthPolicy::None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Listener configuration.
///
/// A `[listener]` table in a file replaces the default plain listener: only
/// the `http`/`https` sub-tables it names are bound.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Plain HTTP listener.
    #[serde(default)]
    pub http: Option<HttpListenerConfig>,

    /// TLS-terminating listener.
    #[serde(default)]
    pub https: Option<TlsListenerConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http: Some(HttpListenerConfig { port: 8080 }),
            https: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpListenerConfig {
    pub port: u16,
}

/// TLS listener with its certificate material.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsListenerConfig {
    pub port: u16,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which sinks receive log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    Disable,
    Console,
    File,
    Both,
}

impl LogMode {
    pub fn console(self) -> bool {
        matches!(self, LogMode::Console | LogMode::Both)
    }

    pub fn file(self) -> bool {
        matches!(self, LogMode::File | LogMode::Both)
    }
}

/// Lowest severity that is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub mode: LogMode,

    pub level: LogLevel,

    /// Directory for the log file when the file sink is enabled.
    pub dir: String,

    /// Rotate the log file by size.
    pub rotate: bool,

    /// Size at which the file rotates.
    pub max_bytes: Option<u64>,

    /// Rotated files kept beside the active one.
    pub max_backup_count: Option<usize>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: LogMode::Console,
            level: LogLevel::Info,
            dir: "./logs".to_string(),
            rotate: false,
            max_bytes: None,
            max_backup_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.listener.http.map(|h| h.port), Some(8080));
        assert_eq!(config.auth, AuthPolicy::None);
        assert_eq!(config.logging.mode, LogMode::Console);
    }

    #[test]
    fn full_file() {
        let config: ProxyConfig = toml::from_str(
            r#"
            timeout_ms = 2500

            [listener]
            bind_address = "127.0.0.1"

            [listener.https]
            port = 8443
            cert_path = "cert.pem"
            key_path = "key.pem"

            [auth]
            type = "basic"
            username = "alice"
            password = "secret"

            [logging]
            mode = "both"
            level = "warn"
            dir = "/var/log/forward-proxy"
            rotate = true
            max_bytes = 1048576
            max_backup_count = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout_ms, 2500);
        assert!(config.listener.http.is_none());
        assert_eq!(config.listener.https.as_ref().map(|h| h.port), Some(8443));
        assert_eq!(config.auth.kind(), "basic");
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.logging.mode.console() && config.logging.mode.file());
        assert_eq!(config.logging.max_backup_count, Some(3));
    }

    #[test]
    fn unknown_log_mode_is_rejected() {
        assert!(toml::from_str::<ProxyConfig>("[logging]\nmode = \"syslog\"").is_err());
    }
}
