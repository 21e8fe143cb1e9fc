//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment keys override file values)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at process start
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BalancerConfig;
pub use schema::BackendConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::DiscoveryConfig;
pub use schema::HealthCheckConfig;
pub use schema::ListenerConfig;
pub use schema::NodeFilter;
pub use schema::ObservabilityConfig;
