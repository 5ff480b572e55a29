//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection on loopback
//!     → listener.rs (SO_REUSEADDR bind, backlog, optional connection bound)
//!     → connection.rs (connection ID, active count for draining)
//!     → Hand off to the request dispatcher
//! ```
//!
//! # Design Decisions
//! - Unbounded by default; a bound is opt-in via `listener.max_connections`
//! - Each connection tracked so shutdown can wait for in-flight sessions

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
