//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc with every connection task
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so the relay runs with no file at all
//! - The upstream proxy URL is not part of the loaded snapshot; it is
//!   re-read per request through `upstream::ProxyUrlSource`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ExecutorConfig, FramingConfig, LifecycleConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, RelayConfig, TimeoutConfig, UpstreamConfig,
};
