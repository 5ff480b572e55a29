//! Plain HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ParsedRequest (non-CONNECT)
//!     → handler.rs (body completion, target normalisation, header filtering)
//!     → executor.rs (external HTTP client process, routed via upstream proxy)
//!     → raw response bytes written back to the client unmodified
//! ```
//!
//! # Design Decisions
//! - The relay never parses responses; the executor's stdout is the response
//! - Executor failures of any kind become one synthesized 500

pub mod executor;
pub mod handler;

pub use executor::{filter_headers, ExecRequest, ExecutorError, HttpExecutor};
pub use handler::handle_plain;
