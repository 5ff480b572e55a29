//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the relay proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, backlog, concurrency bound).
    pub listener: ListenerConfig,

    /// Where the upstream proxy URL comes from and what to fall back to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// External HTTP executor used for plain requests.
    pub executor: ExecutorConfig,

    /// Request body framing behaviour.
    pub framing: FramingConfig,

    /// Size limits applied while reading client requests.
    pub limits: LimitsConfig,

    /// Startup/shutdown settings.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8888").
    pub bind_address: String,

    /// Listen backlog passed to `listen(2)`.
    pub backlog: u32,

    /// Optional bound on concurrently handled connections.
    /// `None` leaves the acceptor unbounded.
    pub max_connections: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
            backlog: 50,
            max_connections: None,
        }
    }
}

/// Upstream proxy discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Environment variables consulted, in order, for the proxy URL.
    pub env_vars: Vec<String>,

    /// Fixed proxy URL. When set, the environment is not consulted.
    pub proxy_url: Option<String>,

    /// Host used when the proxy URL is absent or unparseable.
    pub fallback_host: String,

    /// Port used when the proxy URL is absent or unparseable.
    pub fallback_port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            env_vars: vec!["HTTPS_PROXY".to_string(), "https_proxy".to_string()],
            proxy_url: None,
            fallback_host: "21.0.0.115".to_string(),
            fallback_port: 15004,
        }
    }
}

/// Timeout configuration for the various session phases.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a client to send its request head, in seconds.
    pub head_secs: u64,

    /// Time allowed for the rest of a Content-Length body, in seconds.
    pub body_secs: u64,

    /// Upstream TCP connect timeout in seconds.
    pub connect_secs: u64,

    /// Upstream CONNECT handshake timeout in seconds.
    pub handshake_secs: u64,

    /// Tunnel idle timeout in seconds.
    pub idle_secs: u64,

    /// Executor run timeout in seconds.
    pub executor_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            head_secs: 30,
            body_secs: 30,
            connect_secs: 30,
            handshake_secs: 30,
            idle_secs: 60,
            executor_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn head(&self) -> Duration {
        Duration::from_secs(self.head_secs)
    }

    pub fn body(&self) -> Duration {
        Duration::from_secs(self.body_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn executor(&self) -> Duration {
        Duration::from_secs(self.executor_secs)
    }
}

/// External HTTP executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program to run (looked up on `PATH`).
    pub program: String,

    /// Arguments placed before the generated request arguments.
    pub leading_args: Vec<String>,

    /// Pass the resolved upstream proxy URL with `--proxy`.
    pub pass_proxy: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "curl".to_string(),
            leading_args: Vec::new(),
            pass_proxy: true,
        }
    }
}

/// Request body framing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Keep reading until a declared `Content-Length` is satisfied.
    /// When disabled the body is whatever arrived with the request head.
    pub honor_content_length: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            honor_content_length: true,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a request head in bytes.
    pub max_head_bytes: usize,

    /// Maximum request body buffered for the executor.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long to wait for in-flight connections after shutdown starts.
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
