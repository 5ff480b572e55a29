//! Configuration validation.
//!
//! Semantic checks only; serde handles the syntax. Every problem is
//! collected so a bad file can be fixed in one pass.

use std::net::SocketAddr;

use crate::config::schema::RelayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::new("listener.backlog", "must be greater than 0"));
    }
    if config.listener.max_connections == Some(0) {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than 0 when set",
        ));
    }

    if config.upstream.fallback_host.trim().is_empty() {
        errors.push(ValidationError::new("upstream.fallback_host", "must not be empty"));
    }
    if config.upstream.fallback_port == 0 {
        errors.push(ValidationError::new("upstream.fallback_port", "must be greater than 0"));
    }

    let timeouts = [
        ("timeouts.head_secs", config.timeouts.head_secs),
        ("timeouts.body_secs", config.timeouts.body_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.handshake_secs", config.timeouts.handshake_secs),
        ("timeouts.idle_secs", config.timeouts.idle_secs),
        ("timeouts.executor_secs", config.timeouts.executor_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.executor.program.trim().is_empty() {
        errors.push(ValidationError::new("executor.program", "must not be empty"));
    }

    if config.limits.max_head_bytes < 1024 {
        errors.push(ValidationError::new("limits.max_head_bytes", "must be at least 1024"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
