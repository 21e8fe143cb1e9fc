//! Stateless layer-4 TCP load balancer.
//!
//! Discovers backend nodes, health-checks them over HTTP, and splices each
//! inbound TCP connection to a randomly chosen healthy node through a
//! per-target circuit breaker and connection pool.

pub mod balancer;
pub mod config;
pub mod discovery;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;

pub use balancer::Balancer;
pub use config::BalancerConfig;
pub use lifecycle::Shutdown;
