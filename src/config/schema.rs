//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::{Endpoint, ServerMode, Settings, SocketType};

/// Root configuration for the lifecycle router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listening endpoint.
    pub server: ServerConfig,

    /// Process naming.
    pub process: ProcessConfig,

    /// Request forwarding.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Free-form runtime settings passed to `start`.
    pub settings: Settings,
}

/// Listening endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,

    /// Process model.
    pub mode: ServerMode,

    /// Socket family.
    pub sock_type: SocketType,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let endpoint = Endpoint::default();
        Self {
            host: endpoint.host,
            port: endpoint.port,
            mode: endpoint.mode,
            sock_type: endpoint.sock_type,
        }
    }
}

impl ServerConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port, self.mode, self.sock_type)
    }
}

/// Process naming configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProcessConfig {
    /// Prefix for process titles; naming is off when unset.
    pub name_prefix: Option<String>,
}

/// Request forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpConfig {
    /// Forward HTTP requests to the built-in status bridge.
    pub forward_requests: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
