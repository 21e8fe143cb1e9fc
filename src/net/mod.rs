//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, no admission limit)
//!     → connection.rs (connection id, in-flight tracking for drain)
//!     → Hand off to proxy engine
//! ```
//!
//! # Design Decisions
//! - Payload-agnostic: no framing, no TLS
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
