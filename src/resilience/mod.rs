//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery call:
//!     → backoff.rs (linear delay between bounded attempts)
//!
//! Connection to backend:
//!     → circuit_breaker.rs (gate the dial, record the outcome)
//! ```
//!
//! # Design Decisions
//! - Circuit breaker prevents hammering a target that keeps refusing dials
//! - Breakers are keyed per target and never shared between targets

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker};
