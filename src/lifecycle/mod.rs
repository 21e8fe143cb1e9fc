//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs + Balancer::shutdown):
//!     Close listener → Cancel background loops → Close pool
//!         → Drain in-flight connections (bounded) → Exit
//! ```
//!
//! # Design Decisions
//! - One shared signal cancels both background loops
//! - In-flight connections are never force-cancelled, only waited on
//! - Shutdown has a deadline: the caller learns when the drain overran it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownError, ShutdownSignal};
