//! CONNECT tunnel subsystem.
//!
//! # Data Flow
//! ```text
//! CONNECT host:port from client
//!     → connect.rs: 200 to client → dial upstream → CONNECT handshake → verify
//!     → relay.rs: bidirectional byte copy until close, error or idle timeout
//!     → teardown: both sockets shut down and dropped
//! ```
//!
//! # Design Decisions
//! - The client is told 200 before the upstream dial; once it is in raw-byte
//!   mode no HTTP error can be sent back, so later failures just close
//! - Relay forwards one chunk at a time per direction, never reframes

pub mod connect;
pub mod relay;

pub use connect::{handle_connect, TunnelError};
pub use relay::{relay, RelayEnd, RelayOutcome, RELAY_CHUNK};
