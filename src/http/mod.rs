//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, per-connection task)
//!     → request.rs (frame the request head, capture body bytes)
//!     → CONNECT → tunnel subsystem
//!     → other   → forward subsystem
//!     → response.rs (responses the relay synthesizes itself)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{read_request, FrameError, ParsedRequest};
pub use server::{ProxyServer, RelayState};
