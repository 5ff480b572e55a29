//! Local relay proxy library.
//!
//! Accepts plain HTTP and `CONNECT` requests from a local client and relays
//! them through an authenticating upstream proxy.

pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod tunnel;
pub mod upstream;

pub use config::RelayConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
