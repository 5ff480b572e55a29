//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → metrics exporter → bind listener → spawn server
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → server stops accepting → drain in-flight → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: a bind error at startup is fatal
//! - In-flight sessions are never cancelled; they get a drain deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
