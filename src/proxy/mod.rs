//! Connection proxying.
//!
//! # Data Flow
//! ```text
//! Accepted inbound connection
//!     → engine.rs (healthy snapshot → random target → breaker gate → pool lease)
//!     → splice.rs (both directions concurrently, wait for both)
//!     → pool return, breaker + stats outcome
//! ```
//!
//! # Design Decisions
//! - Stateless per connection: no queuing, no affinity, no retries to another node
//! - One outcome per connection, recorded after both directions finish

pub mod engine;
pub mod splice;

pub use engine::{ProxyEngine, ProxyError};
pub use splice::{splice, SpliceSummary};
