//! Upstream proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyUrlSource (environment / fixed URL)
//!     → locator.rs (pure string parsing)
//!     → UpstreamEndpoint { host, port, credential }
//!     → tunnel handshake / executor arguments
//! ```
//!
//! # Design Decisions
//! - The proxy URL is read at the point of use, never cached
//! - Parsing is pure and cannot fail; bad input yields the fallback endpoint

pub mod locator;
pub mod source;

pub use locator::{locate, Fallback, UpstreamEndpoint};
pub use source::{EnvProxySource, FixedProxySource, ProxyUrlSource};
