//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the host against the socket family
//! - Validate value ranges (log level, metrics address, runtime settings)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::runtime::{RuntimeSettings, SocketType};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.server.host.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) if config.server.sock_type == SocketType::Tcp6 => {
            errors.push(ValidationError::new("server.host", "IPv4 address with sock_type tcp6"));
        }
        Ok(IpAddr::V6(_)) if config.server.sock_type == SocketType::Tcp => {
            errors.push(ValidationError::new("server.host", "IPv6 address with sock_type tcp"));
        }
        Ok(_) => {}
        Err(_) if config.server.host == "localhost" => {}
        Err(_) => errors.push(ValidationError::new(
            "server.host",
            format!("`{}` is not an IP address", config.server.host),
        )),
    }

    if let Some(prefix) = &config.process.name_prefix {
        if prefix.contains('\0') {
            errors.push(ValidationError::new("process.name_prefix", "contains a NUL byte"));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if let Err(e) = RuntimeSettings::from_settings(&config.settings) {
        errors.push(ValidationError::new("settings", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
